// Application state for HTTP handlers
use crate::application::panel_service::PanelService;
use crate::application::series_service::SeriesService;

#[derive(Clone)]
pub struct AppState {
    pub panel_service: PanelService,
    pub series_service: SeriesService,
}
