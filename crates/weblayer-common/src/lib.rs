//! WebLayer Common
//!
//! The pieces every cross-boundary object is assembled from:
//! - [`HandleCell`]: the managed half of a native handle pair
//! - [`ClientSlot`]: the managed half of a remote client stub pair
//! - [`CallbackProxy`]: a handle pair that only re-dispatches engine events
//! - [`Registry`]: identity-keyed directory with lifecycle observers
//! - [`VersionGate`]: the remote client's declared major version
//! - [`TaskRunner`]: the UI sequence plus blocking workers

mod callback_proxy;
mod client;
mod error;
mod handle_cell;
mod ids;
mod registry;
mod sequence;
mod task;
mod version;

pub use callback_proxy::{CallbackProxy, ProxyState};
pub use client::ClientSlot;
pub use error::{AsyncFailure, AsyncResult, LifecycleError, RemoteError, RemoteResult};
pub use handle_cell::{DestroyDiscipline, HandleCell};
pub use ids::{IdAllocator, RequestCounter};
pub use registry::{ObserverId, ObserverList, Registry, RegistryObserver};
pub use sequence::SequenceChecker;
pub use task::TaskRunner;
pub use version::{ClientFeature, VersionGate, VersionPolicy};

pub type Result<T> = std::result::Result<T, LifecycleError>;
