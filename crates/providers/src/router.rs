//! Backend router: selects the model backend for a request.
//!
//! Built once from configuration. Providers that need an API key are only
//! registered when one is configured; Ollama runs locally and is always
//! registered.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use toolrelay_config::AppConfig;
use toolrelay_core::{Error, ModelBackend};
use tracing::debug;

use crate::openai_compat::{self, OpenAiCompatBackend};

/// A provider this process knows how to talk to.
struct KnownProvider {
    name: &'static str,
    description: &'static str,
    key_env: Option<&'static str>,
}

const KNOWN_PROVIDERS: &[KnownProvider] = &[
    KnownProvider {
        name: "deepinfra",
        description: "DeepInfra hosted open-weight models",
        key_env: Some("DEEPINFRA_API_KEY"),
    },
    KnownProvider {
        name: "openai",
        description: "OpenAI GPT models",
        key_env: Some("OPENAI_API_KEY"),
    },
    KnownProvider {
        name: "ollama",
        description: "Local models served by Ollama",
        key_env: None,
    },
];

/// Provider listing entry for `/api/providers` and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub requires_api_key: bool,
    pub models: Vec<String>,
}

/// A backend chosen for one request, with the model it should default to.
#[derive(Clone)]
pub struct SelectedBackend {
    pub name: String,
    pub backend: Arc<dyn ModelBackend>,
    pub default_model: String,
}

struct Route {
    backend: Arc<dyn ModelBackend>,
    default_model: String,
}

/// Routes requests to the correct backend.
pub struct BackendRouter {
    routes: HashMap<String, Route>,
    default_provider: String,
}

impl BackendRouter {
    /// Create an empty router with a default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            routes: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a backend under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn ModelBackend>,
        default_model: impl Into<String>,
    ) {
        let name = name.into();
        debug!(provider = %name, "Registered backend");
        self.routes.insert(
            name,
            Route {
                backend,
                default_model: default_model.into(),
            },
        );
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Pick the named backend, or the default one.
    pub fn select(&self, name: Option<&str>) -> Result<SelectedBackend, Error> {
        let name = name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.default_provider.clone());

        if let Some(route) = self.routes.get(&name) {
            return Ok(SelectedBackend {
                name,
                backend: Arc::clone(&route.backend),
                default_model: route.default_model.clone(),
            });
        }

        match KNOWN_PROVIDERS.iter().find(|p| p.name == name) {
            Some(known) => Err(Error::ProviderNotConfigured {
                hint: match known.key_env {
                    Some(var) => format!("set {var} or providers.{name}.api_key"),
                    None => "provider is not registered".into(),
                },
                name,
            }),
            None => Err(Error::UnknownProvider {
                name,
                available: self.known_names(),
            }),
        }
    }

    /// Whether a backend is registered under `name`.
    pub fn is_available(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Every known provider, plus any extra registered backends.
    pub fn providers(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> = KNOWN_PROVIDERS
            .iter()
            .map(|p| ProviderInfo {
                name: p.name.into(),
                description: p.description.into(),
                available: self.is_available(p.name),
                requires_api_key: p.key_env.is_some(),
                models: self
                    .routes
                    .get(p.name)
                    .map(|r| r.backend.available_models())
                    .unwrap_or_else(|| builtin_models(p.name)),
            })
            .collect();

        let mut extra: Vec<&String> = self
            .routes
            .keys()
            .filter(|name| !KNOWN_PROVIDERS.iter().any(|p| p.name == name.as_str()))
            .collect();
        extra.sort();
        for name in extra {
            let route = &self.routes[name];
            infos.push(ProviderInfo {
                name: name.clone(),
                description: "Custom OpenAI-compatible backend".into(),
                available: true,
                requires_api_key: false,
                models: route.backend.available_models(),
            });
        }

        infos
    }

    fn known_names(&self) -> Vec<String> {
        let mut names: Vec<String> = KNOWN_PROVIDERS.iter().map(|p| p.name.to_string()).collect();
        let mut extra: Vec<String> = self
            .routes
            .keys()
            .filter(|n| !names.contains(n))
            .cloned()
            .collect();
        extra.sort();
        names.extend(extra);
        names
    }

    /// Build the router from configuration.
    pub fn build_from_config(config: &AppConfig) -> Self {
        let mut router = Self::new(config.default_provider.clone());

        for known in KNOWN_PROVIDERS {
            let settings = config.provider(known.name);
            let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty());

            let backend = match (known.name, api_key) {
                ("deepinfra", Some(key)) => OpenAiCompatBackend::deepinfra(key),
                ("openai", Some(key)) => OpenAiCompatBackend::openai(key),
                ("ollama", _) => OpenAiCompatBackend::ollama(settings.api_url.as_deref()),
                _ => {
                    debug!(provider = known.name, "No API key configured, skipping");
                    continue;
                }
            };

            let mut backend = match (&settings.api_url, known.name) {
                (Some(url), name) if name != "ollama" => backend.with_base_url(url.clone()),
                _ => backend,
            };
            if let Some(mode) = settings.tool_call_mode {
                backend = backend.with_tool_call_mode(mode);
            }
            if let Some(secs) = settings.timeout_secs {
                backend = backend.with_timeout(secs);
            }

            let default_model = default_model_for(config, known.name, &backend);
            router.register(known.name, Arc::new(backend), default_model);
        }

        router
    }
}

/// Provider's configured model, else the global default for the default
/// provider, else the provider's first known model.
fn default_model_for(config: &AppConfig, name: &str, backend: &OpenAiCompatBackend) -> String {
    if let Some(model) = config.provider(name).default_model {
        return model;
    }
    if name == config.default_provider {
        return config.default_model.clone();
    }
    backend
        .available_models()
        .into_iter()
        .next()
        .unwrap_or_else(|| config.default_model.clone())
}

fn builtin_models(name: &str) -> Vec<String> {
    let models = match name {
        "deepinfra" => openai_compat::DEEPINFRA_MODELS,
        "openai" => openai_compat::OPENAI_MODELS,
        "ollama" => openai_compat::OLLAMA_MODELS,
        _ => &[],
    };
    models.iter().map(|m| m.to_string()).collect()
}
