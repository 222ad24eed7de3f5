pub mod polling_interval;
