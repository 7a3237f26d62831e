// Panel service - Use case for listing monitored panels
use crate::application::reading_source::ReadingSource;
use crate::domain::panel::PanelSummary;
use crate::infrastructure::config::PanelConfig;
use futures::future::join_all;
use std::sync::Arc;

#[derive(Clone)]
pub struct PanelService {
    source: Arc<dyn ReadingSource>,
    panels: Vec<PanelConfig>,
}

impl PanelService {
    pub fn new(source: Arc<dyn ReadingSource>, panels: Vec<PanelConfig>) -> Self {
        Self { source, panels }
    }

    /// Configured panels with their latest reading when the source can provide one
    pub async fn list_panels(&self) -> Vec<PanelSummary> {
        let latest = join_all(
            self.panels
                .iter()
                .map(|panel| self.source.latest_reading(&panel.id)),
        )
        .await;

        self.panels
            .iter()
            .zip(latest)
            .map(|(panel, result)| {
                let latest = match result {
                    Ok(reading) => reading.map(|r| r.to_view()),
                    Err(e) => {
                        tracing::warn!("Error fetching latest reading for {}: {:#}", panel.id, e);
                        None
                    }
                };

                PanelSummary {
                    id: panel.id.clone(),
                    series_key: panel.series_key.clone(),
                    latest,
                }
            })
            .collect()
    }
}
