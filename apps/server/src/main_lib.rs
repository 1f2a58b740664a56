use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use assetfolio_data_sources::{
    AkshareFundProvider, AlphaVantageProvider, BackfillJob, CarCatalogProvider,
    CryptoHistoryProvider, CryptoTickerProvider, GovRealEstateProvider, HistoryService,
    JuheGoldProvider, Orchestrator, QuoteProvider, RegistryCredentials, ResponseCache,
    TushareFundProvider, YahooChartProvider,
};

use crate::config::Config;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub history_service: HistoryService,
    pub car_catalog: CarCatalogProvider,
    pub cron_secret: Option<String>,
    pub tracked_symbols: Vec<BackfillJob>,
}

pub fn init_tracing() {
    let log_format = std::env::var("AF_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Composition root: caches are created here and injected into the
/// adapters that define a cache policy, never reached through globals.
pub fn build_state(config: &Config) -> Arc<AppState> {
    let yahoo = Arc::new(YahooChartProvider::new());
    let crypto_history = Arc::new(CryptoHistoryProvider::new());

    let metal_cache = Arc::new(ResponseCache::new());

    let providers: Vec<Arc<dyn QuoteProvider>> = vec![
        yahoo.clone(),
        Arc::new(AlphaVantageProvider::new(config.alpha_vantage_key.clone())),
        Arc::new(AkshareFundProvider::new(config.python_path.clone())),
        Arc::new(TushareFundProvider::new(config.tushare_key.clone())),
        Arc::new(CryptoTickerProvider::new()),
        Arc::new(JuheGoldProvider::new(
            config.juhe_gold_key.clone(),
            metal_cache,
        )),
        Arc::new(GovRealEstateProvider::new(RegistryCredentials {
            client_id: config.gov_client_id.clone(),
            secret: config.gov_client_secret.clone(),
        })),
    ];

    let car_catalog = CarCatalogProvider::new(
        config.juhe_car_key.clone(),
        Arc::new(ResponseCache::new()),
        Arc::new(ResponseCache::new()),
        Arc::new(ResponseCache::new()),
    );

    Arc::new(AppState {
        orchestrator: Orchestrator::new(providers),
        history_service: HistoryService::new(yahoo, crypto_history),
        car_catalog,
        cron_secret: config.cron_secret.clone(),
        tracked_symbols: config.tracked_symbols.clone(),
    })
}
