use std::sync::Arc;

use roam_service::RoamService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RoamService>,
}
impl AppState {
	pub async fn new(config: roam_config::Config) -> color_eyre::Result<Self> {
		let store = roam_storage::open_store(&config.storage).await?;
		let service = RoamService::new(config, store)?;

		Ok(Self::with_service(service))
	}

	pub fn with_service(service: RoamService) -> Self {
		Self { service: Arc::new(service) }
	}
}
