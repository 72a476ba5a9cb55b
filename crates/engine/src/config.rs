//! Engine configuration.

use nodes::text::normalize;

/// Reserved words that cancel whatever the correspondent was doing.
pub const DEFAULT_GLOBAL_TRIGGERS: [&str; 8] = [
    "hola", "menu", "inicio", "cancelar", "salir", "start", "reiniciar", "volver",
];

/// Tuning knobs and user-facing texts for [`crate::FlowEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on nodes entered while handling one inbound message.
    pub max_hops: usize,
    /// Sent when no execution is open and no trigger matches.
    pub fallback_message: String,
    /// Normalized reserved words; see [`DEFAULT_GLOBAL_TRIGGERS`].
    pub global_triggers: Vec<String>,
    /// Sent when a node fails or has no executor. The execution stays put.
    pub node_error_message: String,
    /// Sent when the flow or the current node vanished.
    pub flow_changed_message: String,
    /// Sent when auto-advance runs in circles.
    pub loop_message: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hops: 50,
            fallback_message: "No entendí tu mensaje. Escribí *hola* para ver el menú.".into(),
            global_triggers: DEFAULT_GLOBAL_TRIGGERS.iter().map(|w| normalize(w)).collect(),
            node_error_message: "⚠️ Tuvimos un problema procesando tu respuesta. Probá de nuevo en un momento."
                .into(),
            flow_changed_message:
                "⚠️ Esta conversación cambió mientras la usabas. Escribí *hola* para empezar de nuevo."
                    .into(),
            loop_message:
                "⚠️ Algo salió mal en esta conversación. Escribí *hola* para empezar de nuevo.".into(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `CHATFLOW_MAX_HOPS`, `CHATFLOW_FALLBACK_MESSAGE`
    /// and `CHATFLOW_GLOBAL_TRIGGERS` (comma-separated).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(hops) = std::env::var("CHATFLOW_MAX_HOPS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|h| *h > 0)
        {
            config.max_hops = hops;
        }
        if let Ok(message) = std::env::var("CHATFLOW_FALLBACK_MESSAGE") {
            if !message.trim().is_empty() {
                config.fallback_message = message;
            }
        }
        if let Ok(words) = std::env::var("CHATFLOW_GLOBAL_TRIGGERS") {
            config.global_triggers = parse_trigger_list(&words);
        }

        config
    }

    /// `text` must already be normalized.
    pub fn is_global_trigger(&self, text: &str) -> bool {
        !text.is_empty() && self.global_triggers.iter().any(|w| w == text)
    }
}

fn parse_trigger_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize)
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_triggers_are_normalized_words() {
        let config = EngineConfig::default();
        assert!(config.is_global_trigger("menu"));
        assert!(config.is_global_trigger("cancelar"));
        assert!(!config.is_global_trigger("hola que tal"));
        assert!(!config.is_global_trigger(""));
    }

    #[test]
    fn trigger_list_is_split_and_normalized() {
        assert_eq!(
            parse_trigger_list(" Menú, ,SALIR "),
            vec!["menu".to_string(), "salir".to_string()]
        );
    }
}
