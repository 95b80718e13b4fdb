//! `lamabridge init-config`: write the example configuration.

use std::path::Path;

use anyhow::Context;
use console::style;

use lamabridge_infra::config::write_example_config;

pub async fn init_config(path: &Path, force: bool, json: bool) -> anyhow::Result<()> {
    let written = write_example_config(path, force)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        let out = serde_json::json!({
            "path": path.display().to_string(),
            "written": written,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if written {
        println!(
            "\n  {} Example config written to {}\n",
            style("✓").green().bold(),
            style(path.display()).cyan()
        );
    } else {
        println!(
            "\n  {} {} already exists (use {} to replace it)\n",
            style("i").blue().bold(),
            style(path.display()).cyan(),
            style("--force").yellow()
        );
    }
    Ok(())
}
