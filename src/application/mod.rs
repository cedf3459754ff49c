//! Application layer services.
//!
//! Services compose the cache tiers, the URL store and the retry engine, and
//! emit analytics events. Handlers call them and map nothing but the HTTP
//! surface.
//!
//! - [`services::redirect_service::RedirectService`] - Read-through short URL resolution
//! - [`services::shorten_service::ShortenService`] - Short URL creation

pub mod services;
