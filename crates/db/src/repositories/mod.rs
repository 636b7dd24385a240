//! Repository structs: stateless query namespaces over a [`sqlx::PgPool`].

mod annotated_image_repo;
mod image_result_repo;
mod job_repo;
mod job_schedule_repo;

pub use annotated_image_repo::AnnotatedImageRepo;
pub use image_result_repo::ImageResultRepo;
pub use job_repo::JobRepo;
pub use job_schedule_repo::JobScheduleRepo;
