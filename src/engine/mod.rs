// AgentDeck Engine — everything that touches the network, the disk or the
// OS keychain.
//
// Module layout:
//   paths        — data dir, DB path, SSOT root, per-app config roots
//   http         — reqwest client factory + status/quota classification
//   github       — remote fingerprint client and rate governor
//   store        — SQLite record store + key/value engine config
//   config       — updater settings persisted in engine_config
//   credentials  — encrypted GitHub token store
//   ssot         — the local single-source-of-truth file tree
//   sync         — fan-out of resource content into each app's config dir
//                  (hooks merged into settings.json)
//   updates      — branch resolver, change detector, batch scheduler,
//                  update executor and baseline repair

pub mod config;
pub mod credentials;
pub mod github;
pub mod http;
pub mod paths;
pub mod ssot;
pub mod store;
pub mod sync;
pub mod updates;
