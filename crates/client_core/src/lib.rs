//! Client-side plumbing for the finance viewer: API access, the composite
//! screen, and the load coordinator that aggregates its concurrent loads.

pub mod api_client;
pub mod auth;
pub mod config;
mod load_coordinator;
pub mod screen;
pub mod simulated;

pub use api_client::{ApiClient, ApiRequestOptions, HttpApiClient};
pub use auth::{Authenticator, InMemoryAuthenticator};
pub use load_coordinator::{
    CoordinatorError, CoordinatorEvent, DeliveryMode, LoadCallbacks, LoadCoordinator,
    LoadObserver, LoadTicket, ReportOutcome, RoundId, RoundOutcome, RoundSnapshot,
    UnknownDeliveryMode,
};
pub use screen::{MainView, Route, ScreenController, ScreenLoad, ViewResults, VIEWS_PER_SCREEN};
pub use simulated::{Endpoint, SimulatedApiClient};
