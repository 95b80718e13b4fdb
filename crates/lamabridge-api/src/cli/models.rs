//! `lamabridge models`: list backend models in a table.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use lamabridge_core::chat::service::ModelListing;

use crate::state::AppState;

pub async fn list_models(state: &AppState, json: bool) -> Result<()> {
    let models = state.session_service.list_models().await?;

    if json {
        let out: Vec<_> = models
            .iter()
            .map(|m| {
                serde_json::json!({
                    "name": m.info.full_name,
                    "size": m.info.size,
                    "parameters": m.info.parameter_size,
                    "quantization": m.info.quantization,
                    "context_length": m.info.context_length,
                    "configured": m.configured,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if models.is_empty() {
        println!();
        println!(
            "  {} The backend has no models. Pull one with: {}",
            style("i").blue().bold(),
            style("ollama pull <model>").yellow()
        );
        println!();
        return Ok(());
    }

    let default_model = state.config.models.default_model.as_str();
    println!();
    println!("{}", models_table(&models, default_model));
    println!();
    println!(
        "  {} model{}, {} configured",
        style(models.len()).bold(),
        if models.len() == 1 { "" } else { "s" },
        style(models.iter().filter(|m| m.configured).count()).bold()
    );
    println!();
    Ok(())
}

fn models_table(models: &[ModelListing], default_model: &str) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Model").fg(Color::White),
        Cell::new("Size").fg(Color::White),
        Cell::new("Parameters").fg(Color::White),
        Cell::new("Quantization").fg(Color::White),
        Cell::new("Context").fg(Color::White),
        Cell::new("Configured").fg(Color::White),
    ]);

    for model in models {
        let info = &model.info;
        let name = if info.full_name == default_model || info.name == default_model {
            Cell::new(format!("{} (default)", info.full_name)).fg(Color::Green)
        } else {
            Cell::new(&info.full_name).fg(Color::Cyan)
        };
        let configured = if model.configured {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            name,
            Cell::new(&info.size).fg(Color::White),
            Cell::new(info.parameter_size.as_deref().unwrap_or("-")).fg(Color::White),
            Cell::new(info.quantization.as_deref().unwrap_or("-")).fg(Color::White),
            Cell::new(
                info.context_length
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            )
            .fg(Color::DarkGrey),
            configured,
        ]);
    }
    table
}
