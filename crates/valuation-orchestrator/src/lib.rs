pub mod config;

use std::sync::Arc;

use ai_analyst::Analyst;
use data_extraction::Extractor;
use llm_client::{HttpLlmClient, LlmConfig, LlmProvider};
use stock_data::{DataStore, SourceDocument, TruncatedSource};
use valuation_cache::{
    analysis_fingerprint, canonical_json, extraction_fingerprint, valuation_fingerprint,
    CacheStage, CacheStore,
};
use valuation_core::{
    InvestmentMemo, StandardizedValuationInput, ValuationError, ValuationResult, ENGINE_VERSION,
    MEMO_VERSION, SVI_SCHEMA_VERSION,
};
use valuation_engine::ValuationEngine;

pub use config::CoreConfig;

/// Which pipeline stage a refresh targets. Invalidation cascades in
/// dependency order: extraction invalidates valuation and analysis,
/// valuation invalidates analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    Extraction,
    Valuation,
    Analysis,
}

/// Binds the pipeline: load -> truncate -> extract -> value -> analyze,
/// with each expensive stage cached and computed under single-flight.
pub struct ValuationOrchestrator {
    config: CoreConfig,
    data_store: DataStore,
    cache: CacheStore,
    extractor: Extractor,
    engine: ValuationEngine,
    analyst: Analyst,
}

impl ValuationOrchestrator {
    /// Wire the orchestrator against the HTTP model service.
    pub fn from_config(config: CoreConfig) -> anyhow::Result<Self> {
        let llm_config = LlmConfig::new(
            config.llm_base_url.clone(),
            config.llm_api_key.clone(),
            config.llm_model_name.clone(),
        )
        .with_timeout(config.analysis_timeout);
        let provider: Arc<dyn LlmProvider> = Arc::new(HttpLlmClient::new(llm_config)?);
        Ok(Self::with_provider(config, provider))
    }

    /// Wire against an injected provider (tests, alternative backends).
    pub fn with_provider(config: CoreConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let data_store = DataStore::new(config.data_dir.clone());
        let cache = CacheStore::new(config.cache_dir.clone());
        let extractor = Extractor::new(provider.clone())
            .with_timeout(config.extraction_timeout)
            .with_equity_risk_premium_default(config.equity_risk_premium_default);
        let engine = ValuationEngine::new(config.tax_rate);
        let analyst = Analyst::new(provider).with_timeout(config.analysis_timeout);

        Self {
            config,
            data_store,
            cache,
            extractor,
            engine,
            analyst,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Full valuation for a ticker, cache-aware at every stage.
    pub async fn valuation(&self, ticker: &str) -> Result<ValuationResult, ValuationError> {
        let ticker = validate_ticker(ticker)?;
        let (svi, _, _) = self.resolve_svi(&ticker).await?;
        let (result, _) = self.resolve_valuation(&svi).await?;
        Ok(result)
    }

    /// Qualitative memo for a ticker; runs the valuation path first.
    pub async fn analysis(&self, ticker: &str) -> Result<InvestmentMemo, ValuationError> {
        let ticker = validate_ticker(ticker)?;
        let (svi, _, document) = self.resolve_svi(&ticker).await?;
        let (valuation, valuation_fp) = self.resolve_valuation(&svi).await?;

        let svi_canonical = canonical_json(&svi)?;
        let analysis_fp = analysis_fingerprint(&svi_canonical, &valuation_fp, MEMO_VERSION);

        let analyst = self.analyst.clone();
        let narrative = document.business_description().map(|s| s.to_string());
        let producer_svi = svi.clone();
        self.cache
            .with_single_flight(
                CacheStage::Analysis,
                &analysis_fp,
                self.config.analysis_cache_ttl,
                move || async move {
                    analyst
                        .analyze(&producer_svi, &valuation, narrative.as_deref())
                        .await
                },
            )
            .await
    }

    /// Invalidate caches and recompute the valuation.
    pub async fn refresh_valuation(&self, ticker: &str) -> Result<ValuationResult, ValuationError> {
        let ticker = validate_ticker(ticker)?;
        self.refresh(&ticker, RefreshScope::Extraction).await?;
        self.valuation(&ticker).await
    }

    /// Invalidate the memo cache and recompute the analysis.
    pub async fn refresh_analysis(&self, ticker: &str) -> Result<InvestmentMemo, ValuationError> {
        let ticker = validate_ticker(ticker)?;
        self.refresh(&ticker, RefreshScope::Analysis).await?;
        self.analysis(&ticker).await
    }

    /// Invalidate the cache keys covered by `scope`, in dependency order.
    ///
    /// Downstream keys are derived from the currently cached SVI; when no
    /// extraction is cached there is nothing downstream to drop.
    pub async fn refresh(&self, ticker: &str, scope: RefreshScope) -> Result<(), ValuationError> {
        let ticker = validate_ticker(ticker)?;
        let document = self.data_store.load(&ticker).await?;
        let truncated = stock_data::truncate(&document)?;
        let extraction_fp = extraction_fingerprint(
            &ticker,
            &truncated.canonical_json()?,
            SVI_SCHEMA_VERSION,
        );

        let cached_svi: Option<StandardizedValuationInput> = self
            .cache
            .get_payload(CacheStage::Extraction, &extraction_fp)
            .await?;

        if let Some(svi) = cached_svi {
            let svi_canonical = canonical_json(&svi)?;
            let valuation_fp = valuation_fingerprint(&svi_canonical, ENGINE_VERSION);
            let analysis_fp = analysis_fingerprint(&svi_canonical, &valuation_fp, MEMO_VERSION);

            self.cache
                .invalidate(CacheStage::Analysis, &analysis_fp)
                .await?;
            if scope != RefreshScope::Analysis {
                self.cache
                    .invalidate(CacheStage::Valuation, &valuation_fp)
                    .await?;
            }
        }
        if scope == RefreshScope::Extraction {
            self.cache
                .invalidate(CacheStage::Extraction, &extraction_fp)
                .await?;
        }

        tracing::info!("refreshed {:?} scope for {}", scope, ticker);
        Ok(())
    }

    /// Load, truncate, and extract (or read back) the SVI for a ticker.
    async fn resolve_svi(
        &self,
        ticker: &str,
    ) -> Result<(StandardizedValuationInput, String, SourceDocument), ValuationError> {
        let document = self.data_store.load(ticker).await?;
        let truncated = stock_data::truncate(&document)?;
        let extraction_fp = extraction_fingerprint(
            ticker,
            &truncated.canonical_json()?,
            SVI_SCHEMA_VERSION,
        );

        let svi = self
            .extract_single_flight(ticker, &extraction_fp, truncated)
            .await?;
        Ok((svi, extraction_fp, document))
    }

    async fn extract_single_flight(
        &self,
        ticker: &str,
        extraction_fp: &str,
        truncated: TruncatedSource,
    ) -> Result<StandardizedValuationInput, ValuationError> {
        let extractor = self.extractor.clone();
        let ticker = ticker.to_string();
        self.cache
            .with_single_flight(
                CacheStage::Extraction,
                extraction_fp,
                self.config.extraction_cache_ttl,
                move || async move { extractor.extract(&ticker, &truncated).await },
            )
            .await
    }

    /// Run the numeric engine (or read back its cached result) for an SVI.
    async fn resolve_valuation(
        &self,
        svi: &StandardizedValuationInput,
    ) -> Result<(ValuationResult, String), ValuationError> {
        let svi_canonical = canonical_json(svi)?;
        let valuation_fp = valuation_fingerprint(&svi_canonical, ENGINE_VERSION);

        let engine = self.engine.clone();
        let producer_svi = svi.clone();
        let result = self
            .cache
            .with_single_flight(
                CacheStage::Valuation,
                &valuation_fp,
                self.config.valuation_cache_ttl,
                move || async move { engine.evaluate(&producer_svi) },
            )
            .await?;
        Ok((result, valuation_fp))
    }
}

/// Tickers are 1-10 chars from [A-Z0-9.-]; lowercase input is accepted and
/// uppercased.
pub fn validate_ticker(ticker: &str) -> Result<String, ValuationError> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() || ticker.len() > 10 {
        return Err(ValuationError::InvalidInputs(format!(
            "ticker must be 1-10 characters, got {:?}",
            ticker
        )));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return Err(ValuationError::InvalidInputs(format!(
            "ticker contains invalid characters: {:?}",
            ticker
        )));
    }
    Ok(ticker)
}
