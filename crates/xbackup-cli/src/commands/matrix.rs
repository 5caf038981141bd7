use anyhow::Result;
use tracing::info;
use xbackup_core::OptionMatrix;

use super::load_config;

pub async fn run(config_path: &str, opt_matrix: Option<&str>, require: &[String]) -> Result<()> {
    let config = load_config(config_path).await?;

    let matrix = match opt_matrix {
        Some(raw) => OptionMatrix::parse(raw)?,
        None => config.option_matrix()?,
    };

    let mut required = config.required_options.clone();
    required.extend(require.iter().cloned());

    info!(
        "Checking {} required options against {} parsed options",
        required.len(),
        matrix.len()
    );
    matrix.check_required(&required)?;

    let mut options: Vec<_> = matrix.iter().collect();
    options.sort();
    for (key, value) in options {
        println!("{}={}", key, value);
    }
    println!("All {} required options present", required.len());

    Ok(())
}
