//! `toolrelay tools`: list the built-in tools.

use std::fmt::Write;

use toolrelay_config::AppConfig;
use toolrelay_core::tool::ToolDescriptor;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let registry = toolrelay_tools::default_registry(config)?;
    print!("{}", render(&registry.descriptors()));
    Ok(())
}

fn render(tools: &[ToolDescriptor]) -> String {
    let mut out = format!("Available tools ({})\n", tools.len());
    for tool in tools {
        let _ = write!(out, "\n  {}\n    {}\n", tool.name, tool.description);
        for param in &tool.parameters {
            let _ = writeln!(
                out,
                "    - {}: {}{}  {}",
                param.name,
                param.param_type.as_str(),
                if param.required { "" } else { " (optional)" },
                param.description
            );
        }
    }
    out
}
