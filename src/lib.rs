//! repomirror - Mirror upstream repositories into personal accounts on
//! GitHub, GitLab, Bitbucket and Azure DevOps
//!
//! A run reads a list of upstream URLs, keeps a local working copy of each one
//! fast-forwarded from its upstream, and force-pushes every mirror to a
//! same-named repository on each platform, creating those repositories on
//! demand.
//!
//! ## Modules
//!
//! - [`sources`]: repository list parsing
//! - [`mirror`]: local clone / fetch / fast-forward management
//! - [`platform`]: per-platform repository lookup and creation
//! - [`remote`]: platform remote registration and force-push
//! - [`sync`]: run controller tying the stages together
//! - [`config`]: credential store and runtime paths

pub mod config;
pub mod error;
pub mod git;
pub mod health;
pub mod mirror;
pub mod platform;
pub mod remote;
pub mod sources;
pub mod sync;

pub use config::{Config, RuntimePaths};
pub use error::{MirrorError, Result};
pub use git::GitClient;
pub use health::HealthCheck;
pub use mirror::{MirrorManager, MirrorOutcome};
pub use platform::{ensure_remote_repository, Platform, PlatformAdapter};
pub use remote::{PushOutcome, RemoteSync};
pub use sources::{parse_repo_list, RepositorySpec};
pub use sync::{SyncEngine, SyncSummary};
