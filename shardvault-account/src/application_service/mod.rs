pub mod key_cache_service;
