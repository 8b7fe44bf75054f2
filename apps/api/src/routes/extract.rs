//! Extractors whose rejections render as the uniform `AppError` body instead of plain text.

use axum::extract::{FromRequestParts, Path, Query};

use crate::errors::AppError;

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
