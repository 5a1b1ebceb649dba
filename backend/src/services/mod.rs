//! Service layer.
//!
//! The catalog and the action controller hold all mutable state; the session wires them
//! to a [`RemoteGateway`] and the renderer turns their contents into card view models.

pub mod action_controller;
pub mod actions;
pub mod catalog;
pub mod gateway;
pub mod http_gateway;
pub mod render;
pub mod session;

pub use action_controller::{ActionController, PendingAction, Toggle};
pub use actions::{
    map_url, ActionError, ActionEvent, ActionKey, ActionKind, ActionSettings, ActionState,
    ActionStatus, ControlLabel, PanelContent,
};
pub use catalog::{CatalogError, CatalogExport, Generation, SiteCatalog};
pub use gateway::{
    AnalysisPayload, CoordinateQuery, DocumentUpload, DownloadedFile, GatewayError,
    GatewayResult, PreviewMetadata, PreviewPayload, RemoteGateway,
};
pub use http_gateway::HttpGateway;
pub use render::{render_catalog, CatalogView, ControlView, PanelBody, PanelView, SiteCard};
pub use session::{SessionError, SiteSession};
