use document_management_service::{domain::models, inbound::http};
use model_vault::{AccessLevel, EmptyResponse, ErrorResponse, Role};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "docvault",
        description = "Multi-tenant document management",
    ),
    paths(
        // Auth
        http::auth::register_handler,
        http::auth::login_handler,
        http::auth::me_handler,
        http::auth::change_password_handler,
        // Users
        http::users::list_users_handler,
        http::users::create_user_handler,
        http::users::update_user_handler,
        http::users::delete_user_handler,
        http::users::reset_password_handler,
        // Departments and employees
        http::directory::list_departments_handler,
        http::directory::create_department_handler,
        http::directory::get_department_handler,
        http::directory::update_department_handler,
        http::directory::delete_department_handler,
        http::directory::list_employees_handler,
        http::directory::get_employee_handler,
        http::directory::upsert_employee_handler,
        http::directory::set_employment_status_handler,
        // Folders
        http::folders::list_folders_handler,
        http::folders::create_folder_handler,
        http::folders::get_folder_handler,
        http::folders::update_folder_handler,
        http::folders::delete_folder_handler,
        // Documents
        http::documents::search_documents_handler,
        http::documents::upload_document_handler,
        http::documents::list_trash_handler,
        http::documents::bundle_documents_handler,
        http::documents::get_document_handler,
        http::documents::update_document_handler,
        http::documents::delete_document_handler,
        http::documents::download_document_handler,
        http::documents::restore_document_handler,
        http::documents::purge_document_handler,
        http::documents::list_tags_handler,
        // Shares
        http::shares::create_share_code_handler,
        http::shares::redeem_share_code_handler,
        http::shares::list_share_codes_handler,
        http::shares::revoke_share_code_handler,
        http::shares::list_shared_with_me_handler,
        // Conversions
        http::conversions::merge_pdfs_handler,
        http::conversions::split_pdf_handler,
        http::conversions::rotate_pdf_handler,
        http::conversions::watermark_pdf_handler,
        http::conversions::number_pdf_pages_handler,
        http::conversions::resize_image_handler,
        http::conversions::compress_image_handler,
        http::conversions::convert_image_handler,
        http::conversions::batch_conversion_handler,
        // Reporting
        http::audit::query_audit_logs_handler,
        http::analytics::usage_summary_handler,
    ),
    components(
        schemas(
            ErrorResponse,
            EmptyResponse,
            Role,
            AccessLevel,
            models::User,
            models::AuthResponse,
            models::RegisterRequest,
            models::LoginRequest,
            models::ChangePasswordRequest,
            models::CreateUserRequest,
            models::UpdateUserRequest,
            models::ResetPasswordRequest,
            models::Department,
            models::CreateDepartmentRequest,
            models::UpdateDepartmentRequest,
            models::EmployeeProfile,
            models::EmploymentStatus,
            models::UpsertEmployeeRequest,
            models::SetEmploymentStatusRequest,
            models::Folder,
            models::FolderCrumb,
            models::FolderDetails,
            models::CreateFolderRequest,
            models::UpdateFolderRequest,
            models::Document,
            models::DocumentSort,
            models::Tag,
            models::UpdateDocumentRequest,
            models::BundleRequest,
            http::documents::UploadDocumentForm,
            models::ShareCode,
            models::ShareResource,
            models::ShareResourceType,
            models::CreateShareCodeRequest,
            models::RedeemShareCodeRequest,
            models::RedeemShareCodeResponse,
            models::SharedItem,
            models::OutputTarget,
            models::MergePdfsRequest,
            models::SplitPdfRequest,
            models::RotatePdfRequest,
            models::WatermarkPdfRequest,
            models::NumberPdfPagesRequest,
            models::ResizeImageRequest,
            models::CompressImageRequest,
            models::ConvertImageRequest,
            models::BatchOperation,
            models::BatchConversionRequest,
            models::ConversionResult,
            models::AuditLog,
            models::AuditAction,
            models::EntityType,
            models::UsageSummary,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and the current account"),
        (name = "users", description = "Account administration"),
        (name = "directory", description = "Departments and employee profiles"),
        (name = "folders", description = "The folder tree"),
        (name = "documents", description = "Uploads, search, trash and downloads"),
        (name = "shares", description = "Share codes and received shares"),
        (name = "conversions", description = "PDF and image conversions"),
        (name = "audit", description = "The audit log"),
        (name = "analytics", description = "Usage analytics"),
    )
)]
pub struct ApiDoc;
