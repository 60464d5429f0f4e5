//! Multi-currency HD wallet core.
//!
//! Two engines live here. The derivation engine turns an extended public
//! key and a templated derivation scheme into addresses, tracking which of
//! them have been used through a persisted gap-limit state machine
//! ([`keychain::Keychain`]). The synchronization engine drives a
//! single-flight, cursor-based batch loop against a remote
//! [`explorer::BlockchainExplorer`], committing each batch through an
//! external database session and persisting its cursor so interrupted runs
//! resume from the last durable point ([`sync::AccountSynchronizer`]).
//!
//! Everything chain-specific — HTTP explorer clients, SQL row mapping,
//! transaction signing — stays behind the consumed traits in [`explorer`]
//! and [`store`].

pub mod explorer;
pub mod keychain;
pub mod keys;
pub mod store;
pub mod sync;

pub use explorer::{BlockchainExplorer, ExplorerConfig, ExplorerError, ExplorerRegistry};
pub use keychain::{DEFAULT_GAP_LIMIT, KeyPurpose, Keychain, KeychainError, KeychainState};
pub use keys::{
    Address, AddressEncoder, Bech32Encoder, DerivationPath, DerivationScheme, ExtendedKey,
    KeyError, NetworkParameters, P2pkhEncoder, P2shP2wpkhEncoder, PathError, SchemeError,
    SchemeLevel,
};
pub use store::{BatchTransaction, DatabaseError, FilePreferenceStore, PreferenceStore, StoreError};
pub use sync::{AccountSynchronizer, SyncError, SyncNotifier, SyncReport, SyncableAccount};
