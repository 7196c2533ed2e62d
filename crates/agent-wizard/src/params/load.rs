use anyhow::Context as _;

use super::ProviderCatalog;

pub fn from_json_str(s: &str) -> anyhow::Result<ProviderCatalog> {
    let catalog: ProviderCatalog = serde_json::from_str(s).context("invalid provider catalog")?;
    Ok(catalog)
}

/// Load a catalog previously saved with `agent-wizard providers --json`.
pub fn load_from_file(path: &std::path::Path) -> anyhow::Result<ProviderCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read provider catalog {}", path.display()))?;
    from_json_str(&content)
}
