// Application state for HTTP handlers
use crate::application::series_service::SeriesService;

#[derive(Clone)]
pub struct AppState {
    pub series_service: SeriesService,
}
