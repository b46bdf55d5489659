use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
};
use model_vault::{ErrorResponse, UserContext};
use uuid::Uuid;

use super::{HandlerResult, VaultRouterState};
use crate::domain::{
    models::{
        CreateDepartmentRequest, Department, EmployeeFilter, EmployeeProfile,
        SetEmploymentStatusRequest, UpdateDepartmentRequest, UpsertEmployeeRequest,
    },
    ports::{BlobStorage, VaultStorage},
};

pub fn router<S, B, St>(state: VaultRouterState<S, B>) -> Router<St>
where
    S: VaultStorage,
    B: BlobStorage,
    St: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/departments",
            get(list_departments_handler).post(create_department_handler),
        )
        .route(
            "/departments/{id}",
            get(get_department_handler)
                .patch(update_department_handler)
                .delete(delete_department_handler),
        )
        .route("/employees", get(list_employees_handler))
        .route(
            "/employees/{user_id}",
            get(get_employee_handler).put(upsert_employee_handler),
        )
        .route(
            "/employees/{user_id}/status",
            patch(set_employment_status_handler),
        )
        .with_state(state)
}

#[utoipa::path(
    get,
    operation_id = "list_departments",
    path = "/departments",
    tag = "directory",
    responses(
        (status = 200, body = Vec<Department>),
        (status = 403, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_departments_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
) -> HandlerResult<Json<Vec<Department>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .directory
            .list_departments(&user_context)
            .await?,
    ))
}

#[utoipa::path(
    post,
    operation_id = "create_department",
    path = "/departments",
    tag = "directory",
    request_body = CreateDepartmentRequest,
    responses(
        (status = 201, body = Department),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn create_department_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Json(request): Json<CreateDepartmentRequest>,
) -> HandlerResult<(StatusCode, Json<Department>)>
where
    S: VaultStorage,
    B: BlobStorage,
{
    let department = state
        .services
        .directory
        .create_department(&user_context, request)
        .await?;
    Ok((StatusCode::CREATED, Json(department)))
}

#[utoipa::path(
    get,
    operation_id = "get_department",
    path = "/departments/{id}",
    tag = "directory",
    params(("id" = Uuid, Path, description = "Department id")),
    responses(
        (status = 200, body = Department),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn get_department_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<Department>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .directory
            .get_department(&user_context, id)
            .await?,
    ))
}

#[utoipa::path(
    patch,
    operation_id = "update_department",
    path = "/departments/{id}",
    tag = "directory",
    params(("id" = Uuid, Path, description = "Department id")),
    request_body = UpdateDepartmentRequest,
    responses(
        (status = 200, body = Department),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn update_department_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDepartmentRequest>,
) -> HandlerResult<Json<Department>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .directory
            .update_department(&user_context, id, request)
            .await?,
    ))
}

/// Deletes a department. Its employees are left without one.
#[utoipa::path(
    delete,
    operation_id = "delete_department",
    path = "/departments/{id}",
    tag = "directory",
    params(("id" = Uuid, Path, description = "Department id")),
    responses(
        (status = 204),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn delete_department_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(id): Path<Uuid>,
) -> HandlerResult<StatusCode>
where
    S: VaultStorage,
    B: BlobStorage,
{
    state
        .services
        .directory
        .delete_department(&user_context, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    operation_id = "list_employees",
    path = "/employees",
    tag = "directory",
    params(EmployeeFilter),
    responses(
        (status = 200, body = Vec<EmployeeProfile>),
        (status = 403, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn list_employees_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Query(filter): Query<EmployeeFilter>,
) -> HandlerResult<Json<Vec<EmployeeProfile>>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .directory
            .list_employees(&user_context, filter)
            .await?,
    ))
}

/// Members may read their own profile, managers and admins anyone's
#[utoipa::path(
    get,
    operation_id = "get_employee",
    path = "/employees/{user_id}",
    tag = "directory",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, body = EmployeeProfile),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context), fields(user_id = %user_context.user_id))]
pub async fn get_employee_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(user_id): Path<Uuid>,
) -> HandlerResult<Json<EmployeeProfile>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .directory
            .get_profile(&user_context, user_id)
            .await?,
    ))
}

#[utoipa::path(
    put,
    operation_id = "upsert_employee",
    path = "/employees/{user_id}",
    tag = "directory",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = UpsertEmployeeRequest,
    responses(
        (status = 200, body = EmployeeProfile),
        (status = 400, body = ErrorResponse),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn upsert_employee_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpsertEmployeeRequest>,
) -> HandlerResult<Json<EmployeeProfile>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .directory
            .upsert_profile(&user_context, user_id, request)
            .await?,
    ))
}

#[utoipa::path(
    patch,
    operation_id = "set_employment_status",
    path = "/employees/{user_id}/status",
    tag = "directory",
    params(("user_id" = Uuid, Path, description = "User id")),
    request_body = SetEmploymentStatusRequest,
    responses(
        (status = 200, body = EmployeeProfile),
        (status = 403, body = ErrorResponse),
        (status = 404, body = ErrorResponse),
        (status = 500, body = ErrorResponse),
    )
)]
#[tracing::instrument(skip(state, user_context, request), fields(user_id = %user_context.user_id))]
pub async fn set_employment_status_handler<S, B>(
    State(state): State<VaultRouterState<S, B>>,
    Extension(user_context): Extension<UserContext>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SetEmploymentStatusRequest>,
) -> HandlerResult<Json<EmployeeProfile>>
where
    S: VaultStorage,
    B: BlobStorage,
{
    Ok(Json(
        state
            .services
            .directory
            .set_status(&user_context, user_id, request)
            .await?,
    ))
}
