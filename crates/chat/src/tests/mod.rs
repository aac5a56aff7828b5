//! Test-Module fuer perspective-chat

mod relay_tests;
mod test_transport;
