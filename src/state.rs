use crate::ai::FieldExtractor;
use crate::config::Config;
use std::sync::Arc;
use welfare_record_common::TemplateRegistry;

/// 起動時に構築し、以降は読み取り専用で共有する
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    registry: TemplateRegistry,
    extractor: Option<Arc<dyn FieldExtractor>>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: TemplateRegistry,
        extractor: Option<Arc<dyn FieldExtractor>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                extractor,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.inner.registry
    }

    /// APIキー未設定時は None
    pub fn extractor(&self) -> Option<&dyn FieldExtractor> {
        self.inner.extractor.as_deref()
    }
}
