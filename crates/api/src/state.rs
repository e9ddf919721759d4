//! Shared application state.

use std::sync::Arc;

use domain::{
    AssignmentEngine, CommandHandler, InMemoryMerchantDirectory, InMemorySettings,
    MerchantDirectory, OrderService, SettingsProvider,
};
use lifecycle_log::LifecycleStore;
use projections::{MerchantAssignmentsView, OpenItemsView, ProjectionProcessor};

use crate::config::Config;

/// Services and read models behind every handler.
pub struct AppState<S: LifecycleStore> {
    pub orders: OrderService<S>,
    pub assignment: AssignmentEngine<S>,
    pub processor: ProjectionProcessor<S>,
    pub open_items: OpenItemsView,
    pub merchant_assignments: MerchantAssignmentsView,
}

impl<S: LifecycleStore + Clone + 'static> AppState<S> {
    /// Wires services and projections over one store.
    pub fn new(
        store: S,
        settings: Arc<dyn SettingsProvider>,
        directory: Arc<dyn MerchantDirectory>,
        config: &Config,
    ) -> Self {
        let handler = || CommandHandler::new(store.clone()).with_retry_limit(config.claim_retry_limit);

        let orders = OrderService::from_handler(handler(), settings);
        let assignment = AssignmentEngine::from_handler(handler(), directory)
            .with_policy(config.assignment_policy());

        let open_items = OpenItemsView::new();
        let merchant_assignments = MerchantAssignmentsView::new();
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(open_items.clone()));
        processor.register(Box::new(merchant_assignments.clone()));

        Self {
            orders,
            assignment,
            processor,
            open_items,
            merchant_assignments,
        }
    }

    /// Brings the read models up to date before a query.
    pub async fn refresh_views(&self) -> projections::Result<()> {
        self.processor.run_catch_up().await
    }
}

/// State with default pricing, an empty directory and default limits.
pub fn create_default_state<S: LifecycleStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(
        store,
        Arc::new(InMemorySettings::default()),
        Arc::new(InMemoryMerchantDirectory::new()),
        &Config::default(),
    ))
}
