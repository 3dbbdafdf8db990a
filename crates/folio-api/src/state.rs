use std::sync::Arc;

use folio_crypto::Sealer;
use folio_db::Database;

use crate::config::Config;
use crate::geo::GeoLocator;
use crate::google::GoogleApi;
use crate::mailer::SmtpSender;
use crate::uploads::Storage;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler needs. Outbound integrations sit behind traits so
/// tests can swap them.
pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub sealer: Sealer,
    pub storage: Storage,
    pub google: Arc<dyn GoogleApi>,
    pub smtp: Arc<dyn SmtpSender>,
    pub geo: Arc<dyn GeoLocator>,
}
