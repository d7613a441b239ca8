use log::error;
use miette::Diagnostic;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{Request, Response};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ApiError {
    #[error(transparent)]
    DbError(#[from] diesel::result::Error),
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        error!("{:#?}", self);

        // The body stays opaque; details go to the log only
        let rendered = r#"{"ok":false}"#;

        Response::build()
            .status(Status::InternalServerError)
            .header(rocket::http::ContentType::JSON)
            .sized_body(rendered.len(), std::io::Cursor::new(rendered))
            .ok()
    }
}
