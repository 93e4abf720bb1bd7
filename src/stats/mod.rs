pub mod loess;
