use metrics_exporter_prometheus::PrometheusHandle;
use quota_form::config::StorageConfig;
use quota_form::error::AppError;
use quota_form::registration::{
    InMemoryStore, JsonFileStore, QuestionDraft, RegistrationService, StoreError,
};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type MemoryService = RegistrationService<InMemoryStore, InMemoryStore>;
pub(crate) type FileService = RegistrationService<JsonFileStore, JsonFileStore>;

/// Service over one shared in-memory store; state is lost on exit.
pub(crate) fn memory_service(settings: &StorageConfig) -> Arc<MemoryService> {
    let store = Arc::new(InMemoryStore::new());
    Arc::new(RegistrationService::with_settings(
        store.clone(),
        store,
        settings,
    ))
}

/// Service over the JSON documents in `dir`.
pub(crate) fn file_service(
    dir: &Path,
    settings: &StorageConfig,
) -> Result<Arc<FileService>, StoreError> {
    let store = Arc::new(JsonFileStore::open(dir)?);
    Ok(Arc::new(RegistrationService::with_settings(
        store.clone(),
        store,
        settings,
    )))
}

/// Read a JSON array of question drafts, as accepted by `PUT /api/v1/schema`.
pub(crate) fn read_drafts(path: &Path) -> Result<Vec<QuestionDraft>, AppError> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}
