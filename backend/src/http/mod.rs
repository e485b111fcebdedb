//! HTTP server for the flux API.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - Window parsing and validation                          │
//! │  - NDJSON streaming of flux records                       │
//! │  - CORS, compression, error handling                      │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (services/)                                │
//! │  - Predicates, stream encoding                            │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db/)                                   │
//! │  - LocalRepository / ClickHouseRepository                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | GET | `/flux` | `application/x-ndjson` flux records |
//! | POST | `/flux` | same, window in a JSON body |
//! | GET | `/stations` | station registry |
//! | GET | `/ping` | `pong` |
//! | GET | `/health` | service and store status |

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
