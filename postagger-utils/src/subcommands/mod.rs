mod prepare;
pub use prepare::PrepareApp;

mod tag;
pub use tag::TagApp;

mod train;
pub use train::TrainApp;
