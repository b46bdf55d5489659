use std::time::Duration;

use chrono::Utc;
use file_conversion::{
    batch::BatchOutcome,
    image_ops::{ResizeOptions, TargetFormat},
    pdf,
};
use lopdf::content::{Content, Operation};
use model_vault::{AccessLevel, Pagination, Role, UserContext};
use uuid::Uuid;
use vault_auth::{jwt::JwtArgs, password::PasswordHasher};

use super::*;
use crate::{
    domain::{
        error::VaultError,
        models::{
            AuditAction, AuditQuery, BatchConversionRequest, BatchOperation,
            ChangePasswordRequest, ConvertImageRequest, CreateDepartmentRequest,
            CreateFolderRequest, CreateShareCodeRequest, CreateUserRequest, DocumentSearch,
            EmployeeFilter, EmploymentStatus, LoginRequest, MergePdfsRequest, OutputTarget,
            RegisterRequest, ResizeImageRequest, SetEmploymentStatusRequest, ShareCode,
            ShareResource, SplitPdfRequest, UpdateDocumentRequest, UpdateUserRequest,
            UploadDocument, UpsertEmployeeRequest, UsageQuery,
        },
        ports::ShareRepository,
    },
    outbound::memory::{MemoryBlobStorage, MemoryVault},
};

const PASSWORD: &str = "correct-horse-9";
const MAX_UPLOAD_BYTES: usize = 64 * 1024;

struct Harness {
    storage: MemoryVault,
    blob: MemoryBlobStorage,
    services: VaultServices<MemoryVault, MemoryBlobStorage>,
}

impl Harness {
    fn new() -> Self {
        let storage = MemoryVault::new();
        let blob = MemoryBlobStorage::new();
        let jwt_args = JwtArgs::new(
            "test-secret",
            "docvault",
            "docvault-api",
            Duration::from_secs(3600),
        )
        .unwrap();
        let services = VaultServices::new(
            storage.clone(),
            blob.clone(),
            jwt_args,
            PasswordHasher::with_cost(4),
            MAX_UPLOAD_BYTES,
        );
        Self {
            storage,
            blob,
            services,
        }
    }

    async fn register(&self, organization: &str, email: &str) -> UserContext {
        self.services
            .auth
            .register(RegisterRequest {
                organization_name: organization.to_string(),
                email: email.to_string(),
                password: PASSWORD.to_string(),
                full_name: format!("{organization} admin"),
            })
            .await
            .unwrap()
            .user
            .context()
    }

    async fn add_user(&self, admin: &UserContext, email: &str, role: Role) -> UserContext {
        self.services
            .admin
            .create_user(
                admin,
                CreateUserRequest {
                    email: email.to_string(),
                    full_name: email.to_string(),
                    role,
                    password: PASSWORD.to_string(),
                },
            )
            .await
            .unwrap()
            .context()
    }

    async fn folder(&self, user: &UserContext, name: &str, parent_id: Option<Uuid>) -> Uuid {
        self.services
            .folders
            .create(
                user,
                CreateFolderRequest {
                    name: name.to_string(),
                    parent_id,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn upload(
        &self,
        user: &UserContext,
        filename: &str,
        bytes: Vec<u8>,
        folder_id: Option<Uuid>,
    ) -> Uuid {
        self.services
            .documents
            .upload(
                user,
                UploadDocument {
                    filename: filename.to_string(),
                    bytes,
                    folder_id,
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .id
    }
}

fn sample_pdf(pages: usize) -> Vec<u8> {
    use lopdf::{Dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for index in 0..pages {
        let content = Content {
            operations: vec![Operation::new(
                "re",
                vec![
                    Object::Integer(10 * index as i64),
                    Object::Integer(10),
                    Object::Integer(50),
                    Object::Integer(50),
                ],
            )],
        };
        let content_id =
            doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        page.set(
            "MediaBox",
            vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        );
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Count", Object::Integer(pages as i64));
    tree.set("Kids", kids);
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 3) as u8, (y * 5) as u8, 200])
    });
    let mut cursor = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

#[tokio::test]
async fn test_register_and_login() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "Owner@Acme.io").await;
    assert_eq!(admin.email, "owner@acme.io");
    assert_eq!(admin.role, Role::Admin);

    let duplicate = harness
        .services
        .auth
        .register(RegisterRequest {
            organization_name: "Other".to_string(),
            email: "owner@acme.io".to_string(),
            password: PASSWORD.to_string(),
            full_name: "Someone".to_string(),
        })
        .await;
    assert!(matches!(duplicate, Err(VaultError::Conflict(_))));

    let wrong = harness
        .services
        .auth
        .login(LoginRequest {
            email: "owner@acme.io".to_string(),
            password: "not-the-password-1".to_string(),
        })
        .await;
    assert!(matches!(wrong, Err(VaultError::Unauthorized(_))));

    let response = harness
        .services
        .auth
        .login(LoginRequest {
            email: " OWNER@acme.io ".to_string(),
            password: PASSWORD.to_string(),
        })
        .await?;
    assert!(!response.token.is_empty());
    assert_eq!(response.user.id, admin.user_id);
    assert!(response.user.last_login_at.is_some());

    let actions: Vec<AuditAction> = harness
        .storage
        .audit_logs(admin.organization_id)
        .into_iter()
        .map(|log| log.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::UserRegister,
            AuditAction::UserLoginFailed,
            AuditAction::UserLogin
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_weak_passwords_and_password_change() -> anyhow::Result<()> {
    let harness = Harness::new();
    let weak = harness
        .services
        .auth
        .register(RegisterRequest {
            organization_name: "Acme".to_string(),
            email: "a@acme.io".to_string(),
            password: "short".to_string(),
            full_name: "A".to_string(),
        })
        .await;
    assert!(matches!(weak, Err(VaultError::Validation(_))));

    let admin = harness.register("Acme", "a@acme.io").await;
    let wrong_current = harness
        .services
        .auth
        .change_password(
            &admin,
            ChangePasswordRequest {
                current_password: "nope-nope-1".to_string(),
                new_password: "another-pass-2".to_string(),
            },
        )
        .await;
    assert!(matches!(wrong_current, Err(VaultError::Unauthorized(_))));

    harness
        .services
        .auth
        .change_password(
            &admin,
            ChangePasswordRequest {
                current_password: PASSWORD.to_string(),
                new_password: "another-pass-2".to_string(),
            },
        )
        .await?;

    harness
        .services
        .auth
        .login(LoginRequest {
            email: "a@acme.io".to_string(),
            password: "another-pass-2".to_string(),
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_deactivated_accounts_cannot_log_in() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;

    harness
        .services
        .admin
        .update_user(
            &admin,
            member.user_id,
            UpdateUserRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?;

    let login = harness
        .services
        .auth
        .login(LoginRequest {
            email: "member@acme.io".to_string(),
            password: PASSWORD.to_string(),
        })
        .await;
    assert!(matches!(login, Err(VaultError::Forbidden(_))));

    let active = harness.services.auth.active_user(&member).await;
    assert!(matches!(active, Err(VaultError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn test_admin_rules() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;

    let by_member = harness
        .services
        .admin
        .list_users(&member, Pagination::default())
        .await;
    assert!(matches!(by_member, Err(VaultError::Forbidden(_))));

    let demote_self = harness
        .services
        .admin
        .update_user(
            &admin,
            admin.user_id,
            UpdateUserRequest {
                role: Some(Role::Member),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(demote_self, Err(VaultError::Forbidden(_))));

    let delete_self = harness.services.admin.delete_user(&admin, admin.user_id).await;
    assert!(matches!(delete_self, Err(VaultError::Forbidden(_))));

    let taken = harness
        .services
        .admin
        .create_user(
            &admin,
            CreateUserRequest {
                email: "MEMBER@acme.io".to_string(),
                full_name: "Again".to_string(),
                role: Role::Member,
                password: PASSWORD.to_string(),
            },
        )
        .await;
    assert!(matches!(taken, Err(VaultError::Conflict(_))));

    let users = harness
        .services
        .admin
        .list_users(&admin, Pagination::default())
        .await?;
    assert_eq!(users.total, 2);
    Ok(())
}

#[tokio::test]
async fn test_deleting_a_user_hands_over_their_documents() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;

    let folder = harness.folder(&member, "Notes", None).await;
    let document = harness
        .upload(&member, "notes.txt", b"remember".to_vec(), Some(folder))
        .await;

    harness
        .services
        .admin
        .delete_user(&admin, member.user_id)
        .await?;

    let document = harness.services.documents.get(&admin, document).await?;
    assert_eq!(document.owner_id, admin.user_id);
    let folder = harness.services.folders.get(&admin, folder).await?;
    assert_eq!(folder.folder.owner_id, admin.user_id);

    let again = harness.services.admin.delete_user(&admin, member.user_id).await;
    assert!(matches!(again, Err(VaultError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_folder_tree_rules() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;

    let reports = harness.folder(&user, "Reports", None).await;
    let q3 = harness.folder(&user, "Q3", Some(reports)).await;

    let clash = harness
        .services
        .folders
        .create(
            &user,
            CreateFolderRequest {
                name: "q3".to_string(),
                parent_id: Some(reports),
            },
        )
        .await;
    assert!(matches!(clash, Err(VaultError::Conflict(_))));

    let into_child = harness
        .services
        .folders
        .move_folder(&user, reports, Some(q3))
        .await;
    assert!(matches!(into_child, Err(VaultError::Validation(_))));

    let into_self = harness
        .services
        .folders
        .move_folder(&user, reports, Some(reports))
        .await;
    assert!(matches!(into_self, Err(VaultError::Validation(_))));

    let details = harness.services.folders.get(&user, q3).await?;
    let names: Vec<&str> = details.path.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Reports", "Q3"]);

    let renamed = harness.services.folders.rename(&user, q3, " Q4 ").await?;
    assert_eq!(renamed.name, "Q4");

    let moved = harness.services.folders.move_folder(&user, q3, None).await?;
    assert_eq!(moved.parent_id, None);
    Ok(())
}

#[tokio::test]
async fn test_recursive_folder_delete_trashes_documents() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;

    let top = harness.folder(&user, "Top", None).await;
    let inner = harness.folder(&user, "Inner", Some(top)).await;
    let document = harness
        .upload(&user, "plan.txt", b"the plan".to_vec(), Some(inner))
        .await;

    let refused = harness.services.folders.delete(&user, top, false).await;
    assert!(matches!(refused, Err(VaultError::Conflict(_))));

    harness.services.folders.delete(&user, top, true).await?;

    assert!(matches!(
        harness.services.folders.get(&user, inner).await,
        Err(VaultError::NotFound(_))
    ));
    let trash = harness
        .services
        .documents
        .list_trash(&user, Pagination::default())
        .await?;
    assert_eq!(trash.total, 1);
    assert_eq!(trash.items[0].id, document);

    let restored = harness.services.documents.restore(&user, document).await?;
    assert_eq!(restored.folder_id, None);
    assert!(restored.deleted_at.is_none());
    Ok(())
}

#[tokio::test]
async fn test_trashed_documents_do_not_block_folder_delete() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;

    let folder = harness.folder(&user, "Old", None).await;
    let document = harness
        .upload(&user, "draft.txt", b"draft".to_vec(), Some(folder))
        .await;
    harness.services.documents.delete(&user, document).await?;

    harness.services.folders.delete(&user, folder, false).await?;

    let trash = harness
        .services
        .documents
        .list_trash(&user, Pagination::default())
        .await?;
    assert_eq!(trash.total, 1);
    assert_eq!(trash.items[0].folder_id, None);

    let restored = harness.services.documents.restore(&user, document).await?;
    assert_eq!(restored.folder_id, None);
    Ok(())
}

#[tokio::test]
async fn test_document_lifecycle() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;

    let empty = harness
        .services
        .documents
        .upload(
            &user,
            UploadDocument {
                filename: "empty.txt".to_string(),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(empty, Err(VaultError::Validation(_))));

    let too_large = harness
        .services
        .documents
        .upload(
            &user,
            UploadDocument {
                filename: "big.bin".to_string(),
                bytes: vec![0; MAX_UPLOAD_BYTES + 1],
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(too_large, Err(VaultError::PayloadTooLarge(_))));

    let budget = sample_pdf(1);
    let document = harness
        .services
        .documents
        .upload(
            &user,
            UploadDocument {
                filename: "budget.pdf".to_string(),
                content_type: Some("application/octet-stream".to_string()),
                bytes: budget.clone(),
                tags: vec!["Finance".to_string(), "finance".to_string()],
                description: Some("yearly budget".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(document.title, "budget.pdf");
    assert_eq!(document.mime_type, "application/pdf");
    assert_eq!(document.tags, vec!["finance"]);
    assert_eq!(document.checksum.len(), 64);
    assert!(harness.blob.contains(&document.storage_key));

    let content = harness.services.documents.download(&user, document.id).await?;
    assert_eq!(content.bytes, budget);

    let updated = harness
        .services
        .documents
        .update_metadata(
            &user,
            document.id,
            UpdateDocumentRequest {
                title: Some("Budget 2026".to_string()),
                tags: Some(vec!["finance".to_string(), "2026".to_string()]),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.title, "Budget 2026");

    harness.services.documents.delete(&user, document.id).await?;
    let twice = harness.services.documents.delete(&user, document.id).await;
    assert!(matches!(twice, Err(VaultError::Conflict(_))));
    assert!(matches!(
        harness.services.documents.get(&user, document.id).await,
        Err(VaultError::NotFound(_))
    ));

    harness.services.documents.restore(&user, document.id).await?;
    harness.services.documents.get(&user, document.id).await?;

    harness.services.documents.purge(&user, document.id).await?;
    assert!(harness.blob.is_empty());
    assert!(matches!(
        harness.services.documents.get(&user, document.id).await,
        Err(VaultError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_search_only_returns_visible_documents() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let alice = harness.add_user(&admin, "alice@acme.io", Role::Member).await;
    let bob = harness.add_user(&admin, "bob@acme.io", Role::Member).await;

    harness
        .services
        .documents
        .upload(
            &alice,
            UploadDocument {
                filename: "invoice-001.txt".to_string(),
                bytes: b"invoice".to_vec(),
                tags: vec!["billing".to_string()],
                ..Default::default()
            },
        )
        .await?;
    harness
        .upload(&bob, "holiday.png", sample_png(4, 4), None)
        .await;

    let search = |query: &str| DocumentSearch {
        query: Some(query.to_string()),
        ..Default::default()
    };

    let alice_hits = harness.services.documents.search(&alice, search("INVOICE")).await?;
    assert_eq!(alice_hits.total, 1);
    let bob_hits = harness.services.documents.search(&bob, search("invoice")).await?;
    assert_eq!(bob_hits.total, 0);
    let admin_hits = harness
        .services
        .documents
        .search(&admin, DocumentSearch::default())
        .await?;
    assert_eq!(admin_hits.total, 2);

    let images = harness
        .services
        .documents
        .search(
            &admin,
            DocumentSearch {
                mime_prefix: Some("Image/".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(images.total, 1);

    let tagged = harness
        .services
        .documents
        .search(
            &admin,
            DocumentSearch {
                tag: Some("Billing".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(tagged.total, 1);

    let backwards = harness
        .services
        .documents
        .search(
            &admin,
            DocumentSearch {
                created_from: Some(Utc::now()),
                created_to: Some(Utc::now() - chrono::Duration::days(1)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(backwards, Err(VaultError::Validation(_))));

    let tags = harness.services.documents.list_tags(&admin).await?;
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "billing");
    assert_eq!(tags[0].document_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_share_codes_grant_access() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let alice = harness.add_user(&admin, "alice@acme.io", Role::Member).await;
    let bob = harness.add_user(&admin, "bob@acme.io", Role::Member).await;

    let folder = harness.folder(&alice, "Shared", None).await;
    let document = harness
        .upload(&alice, "draft.txt", b"draft".to_vec(), Some(folder))
        .await;

    assert!(matches!(
        harness.services.documents.get(&bob, document).await,
        Err(VaultError::NotFound(_))
    ));

    let owner_code = harness
        .services
        .shares
        .create_code(
            &alice,
            CreateShareCodeRequest {
                resource: ShareResource::Folder(folder),
                access_level: AccessLevel::Owner,
                expires_in_hours: None,
                max_uses: None,
            },
        )
        .await;
    assert!(matches!(owner_code, Err(VaultError::Validation(_))));

    let not_owner = harness
        .services
        .shares
        .create_code(
            &bob,
            CreateShareCodeRequest {
                resource: ShareResource::Folder(folder),
                access_level: AccessLevel::View,
                expires_in_hours: None,
                max_uses: None,
            },
        )
        .await;
    assert!(matches!(not_owner, Err(VaultError::NotFound(_))));

    let code = harness
        .services
        .shares
        .create_code(
            &alice,
            CreateShareCodeRequest {
                resource: ShareResource::Folder(folder),
                access_level: AccessLevel::Edit,
                expires_in_hours: Some(24),
                max_uses: Some(1),
            },
        )
        .await?;

    let own = harness.services.shares.redeem(&alice, &code.code).await?;
    assert_eq!(own.access_level, AccessLevel::Owner);

    let redeemed = harness
        .services
        .shares
        .redeem(&bob, &code.code.to_lowercase())
        .await?;
    assert_eq!(redeemed.access_level, AccessLevel::Edit);
    assert_eq!(redeemed.resource, ShareResource::Folder(folder));

    // folder grants reach the documents inside
    harness.services.documents.get(&bob, document).await?;
    harness
        .services
        .documents
        .update_metadata(
            &bob,
            document,
            UpdateDocumentRequest {
                title: Some("Draft v2".to_string()),
                ..Default::default()
            },
        )
        .await?;
    let delete = harness.services.documents.delete(&bob, document).await;
    assert!(matches!(delete, Err(VaultError::Forbidden(_))));

    let shared = harness.services.shares.list_shared_with_me(&bob).await?;
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].name, "Shared");
    assert_eq!(shared[0].owner_id, alice.user_id);

    let used_up = harness.services.shares.redeem(&admin, &code.code).await;
    assert!(matches!(used_up, Err(VaultError::Validation(_))));

    let codes = harness
        .services
        .shares
        .list_codes(&alice, ShareResource::Folder(folder))
        .await?;
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0].use_count, 1);

    harness.services.shares.revoke(&alice, code.id).await?;
    let twice = harness.services.shares.revoke(&alice, code.id).await;
    assert!(matches!(twice, Err(VaultError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn test_share_codes_stay_inside_their_organization() -> anyhow::Result<()> {
    let harness = Harness::new();
    let acme = harness.register("Acme", "admin@acme.io").await;
    let globex = harness.register("Globex", "admin@globex.io").await;

    let document = harness.upload(&acme, "secret.txt", b"s".to_vec(), None).await;
    let code = harness
        .services
        .shares
        .create_code(
            &acme,
            CreateShareCodeRequest {
                resource: ShareResource::Document(document),
                access_level: AccessLevel::View,
                expires_in_hours: None,
                max_uses: None,
            },
        )
        .await?;

    let foreign = harness.services.shares.redeem(&globex, &code.code).await;
    assert!(matches!(foreign, Err(VaultError::NotFound(_))));
    assert!(matches!(
        harness.services.documents.get(&globex, document).await,
        Err(VaultError::NotFound(_))
    ));

    let malformed = harness.services.shares.redeem(&globex, "ABC").await;
    assert!(matches!(malformed, Err(VaultError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_expired_share_codes_are_rejected() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;
    let document = harness.upload(&admin, "old.txt", b"old".to_vec(), None).await;

    let now = Utc::now();
    let expired = ShareCode {
        id: Uuid::now_v7(),
        code: "EXPRD2".to_string(),
        organization_id: admin.organization_id,
        resource: ShareResource::Document(document),
        access_level: AccessLevel::View,
        created_by: admin.user_id,
        expires_at: Some(now - chrono::Duration::hours(1)),
        max_uses: None,
        use_count: 0,
        revoked_at: None,
        created_at: now - chrono::Duration::hours(2),
    };
    assert!(harness.storage.insert_share_code(&expired).await?);

    let result = harness.services.shares.redeem(&member, "exprd2").await;
    assert!(matches!(result, Err(VaultError::Validation(message)) if message.contains("expired")));
    Ok(())
}

#[tokio::test]
async fn test_directory() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let manager = harness.add_user(&admin, "manager@acme.io", Role::Manager).await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;

    let department = harness
        .services
        .directory
        .create_department(
            &admin,
            CreateDepartmentRequest {
                name: "Engineering".to_string(),
                description: None,
                manager_id: Some(manager.user_id),
            },
        )
        .await?;

    let duplicate = harness
        .services
        .directory
        .create_department(
            &admin,
            CreateDepartmentRequest {
                name: "engineering".to_string(),
                description: None,
                manager_id: None,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(VaultError::Conflict(_))));

    let by_manager = harness
        .services
        .directory
        .create_department(
            &manager,
            CreateDepartmentRequest {
                name: "Sales".to_string(),
                description: None,
                manager_id: None,
            },
        )
        .await;
    assert!(matches!(by_manager, Err(VaultError::Forbidden(_))));

    let profile = harness
        .services
        .directory
        .upsert_profile(
            &admin,
            member.user_id,
            UpsertEmployeeRequest {
                department_id: Some(department.id),
                monitor_id: Some(manager.user_id),
                job_title: Some("Engineer".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(profile.email, "member@acme.io");
    assert_eq!(profile.employment_status, EmploymentStatus::Active);

    harness
        .services
        .directory
        .upsert_profile(
            &admin,
            manager.user_id,
            UpsertEmployeeRequest {
                department_id: Some(department.id),
                ..Default::default()
            },
        )
        .await?;

    let cycle = harness
        .services
        .directory
        .upsert_profile(
            &admin,
            manager.user_id,
            UpsertEmployeeRequest {
                monitor_id: Some(member.user_id),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(cycle, Err(VaultError::Validation(_))));

    let self_monitor = harness
        .services
        .directory
        .upsert_profile(
            &admin,
            member.user_id,
            UpsertEmployeeRequest {
                monitor_id: Some(member.user_id),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(self_monitor, Err(VaultError::Validation(_))));

    harness.services.directory.get_profile(&member, member.user_id).await?;
    let other = harness.services.directory.get_profile(&member, manager.user_id).await;
    assert!(matches!(other, Err(VaultError::Forbidden(_))));

    harness
        .services
        .directory
        .set_status(
            &admin,
            member.user_id,
            SetEmploymentStatusRequest {
                status: EmploymentStatus::OnLeave,
            },
        )
        .await?;

    let on_leave = harness
        .services
        .directory
        .list_employees(
            &manager,
            EmployeeFilter {
                status: Some(EmploymentStatus::OnLeave),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(on_leave.len(), 1);
    assert_eq!(on_leave[0].user_id, member.user_id);

    harness
        .services
        .directory
        .delete_department(&admin, department.id)
        .await?;
    let profile = harness.services.directory.get_profile(&admin, member.user_id).await?;
    assert_eq!(profile.department_id, None);
    Ok(())
}

#[tokio::test]
async fn test_pdf_conversions() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;
    let folder = harness.folder(&user, "Contracts", None).await;

    let first = harness.upload(&user, "a.pdf", sample_pdf(2), Some(folder)).await;
    let second = harness.upload(&user, "b.pdf", sample_pdf(3), Some(folder)).await;
    let text = harness.upload(&user, "c.txt", b"text".to_vec(), None).await;

    let too_few = harness
        .services
        .conversions
        .merge_pdfs(
            &user,
            MergePdfsRequest {
                document_ids: vec![first],
                title: None,
                output: OutputTarget::default(),
            },
        )
        .await;
    assert!(matches!(too_few, Err(VaultError::Validation(_))));

    let not_pdf = harness
        .services
        .conversions
        .merge_pdfs(
            &user,
            MergePdfsRequest {
                document_ids: vec![first, text],
                title: None,
                output: OutputTarget::default(),
            },
        )
        .await;
    assert!(matches!(not_pdf, Err(VaultError::Validation(_))));

    let merged = harness
        .services
        .conversions
        .merge_pdfs(
            &user,
            MergePdfsRequest {
                document_ids: vec![first, second],
                title: Some("Bundle".to_string()),
                output: OutputTarget::default(),
            },
        )
        .await?;
    let merged = &merged.documents[0];
    assert_eq!(merged.original_filename, "Bundle.pdf");
    assert_eq!(merged.folder_id, Some(folder));
    let bytes = harness.services.documents.download(&user, merged.id).await?.bytes;
    assert_eq!(pdf::page_count(&bytes)?, 5);

    let split = harness
        .services
        .conversions
        .split_pdf(
            &user,
            SplitPdfRequest {
                document_id: second,
                ranges: None,
                output: OutputTarget::default(),
            },
        )
        .await?;
    let names: Vec<&str> = split
        .documents
        .iter()
        .map(|d| d.original_filename.as_str())
        .collect();
    assert_eq!(names, vec!["b (page 1).pdf", "b (page 2).pdf", "b (page 3).pdf"]);

    let audited = harness
        .storage
        .audit_logs(user.organization_id)
        .into_iter()
        .filter(|log| log.action == AuditAction::DocumentConvert)
        .count();
    assert_eq!(audited, 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_split_keeps_no_parts() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;
    let source = harness.upload(&user, "report.pdf", sample_pdf(3), None).await;

    // the first part is written, the second one fails
    harness.blob.fail_puts_after(1);
    let result = harness
        .services
        .conversions
        .split_pdf(
            &user,
            SplitPdfRequest {
                document_id: source,
                ranges: None,
                output: OutputTarget::default(),
            },
        )
        .await;
    assert!(result.is_err());

    assert_eq!(harness.blob.len(), 1);
    let documents = harness
        .services
        .documents
        .search(&user, DocumentSearch::default())
        .await?;
    assert_eq!(documents.total, 1);
    assert_eq!(documents.items[0].id, source);
    let trash = harness
        .services
        .documents
        .list_trash(&user, Pagination::default())
        .await?;
    assert_eq!(trash.total, 0);
    Ok(())
}

#[tokio::test]
async fn test_image_conversions() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;
    let image = harness.upload(&user, "photo.png", sample_png(40, 20), None).await;

    let converted = harness
        .services
        .conversions
        .convert_image(
            &user,
            ConvertImageRequest {
                document_id: image,
                target: TargetFormat::Jpeg,
                output: OutputTarget::default(),
            },
        )
        .await?;
    assert_eq!(converted.documents[0].original_filename, "photo.jpg");
    assert_eq!(converted.documents[0].mime_type, "image/jpeg");

    let resized = harness
        .services
        .conversions
        .resize_image(
            &user,
            ResizeImageRequest {
                document_id: image,
                options: ResizeOptions {
                    width: Some(20),
                    ..Default::default()
                },
                output: OutputTarget::default(),
            },
        )
        .await?;
    assert_eq!(resized.documents[0].original_filename, "photo (resized).png");
    Ok(())
}

#[tokio::test]
async fn test_batch_conversion_reports_each_document() -> anyhow::Result<()> {
    let harness = Harness::new();
    let user = harness.register("Acme", "admin@acme.io").await;
    let first = harness.upload(&user, "one.png", sample_png(10, 10), None).await;
    let text = harness.upload(&user, "two.txt", b"nope".to_vec(), None).await;
    let second = harness.upload(&user, "three.png", sample_png(12, 8), None).await;

    let result = harness
        .services
        .conversions
        .batch(
            &user,
            BatchConversionRequest {
                document_ids: vec![first, text, second, Uuid::now_v7()],
                operation: BatchOperation::ConvertImage {
                    target: TargetFormat::Bmp,
                },
                output: OutputTarget::default(),
            },
        )
        .await?;

    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 2);
    let keys: Vec<Uuid> = result.results.iter().map(|r| r.key).collect();
    assert_eq!(keys[..3], [first, text, second]);
    assert!(matches!(
        &result.results[0].outcome,
        BatchOutcome::Succeeded { output } if output.original_filename == "one.bmp"
    ));
    assert!(matches!(&result.results[1].outcome, BatchOutcome::Failed { .. }));

    let empty = harness
        .services
        .conversions
        .batch(
            &user,
            BatchConversionRequest {
                document_ids: vec![],
                operation: BatchOperation::RotatePdf { degrees: 90 },
                output: OutputTarget::default(),
            },
        )
        .await;
    assert!(matches!(empty, Err(VaultError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn test_bundle() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;

    let first = harness.upload(&admin, "a.txt", b"a".to_vec(), None).await;
    let second = harness.upload(&admin, "b.txt", b"b".to_vec(), None).await;

    let zip = harness
        .services
        .documents
        .bundle(&admin, vec![first, second, first])
        .await?;
    assert_eq!(&zip[..2], b"PK");

    let hidden = harness.services.documents.bundle(&member, vec![first]).await;
    assert!(matches!(hidden, Err(VaultError::NotFound(_))));

    let nothing = harness.services.documents.bundle(&admin, vec![]).await;
    assert!(matches!(nothing, Err(VaultError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn test_usage_summary() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;

    harness.upload(&admin, "a.pdf", sample_pdf(1), None).await;
    let trashed = harness.upload(&member, "b.png", sample_png(2, 2), None).await;
    harness.upload(&member, "c.png", sample_png(3, 3), None).await;
    harness.services.documents.delete(&member, trashed).await?;

    let forbidden = harness
        .services
        .analytics
        .usage_summary(&member, UsageQuery::default())
        .await;
    assert!(matches!(forbidden, Err(VaultError::Forbidden(_))));

    let out_of_range = harness
        .services
        .analytics
        .usage_summary(&admin, UsageQuery { days: Some(0) })
        .await;
    assert!(matches!(out_of_range, Err(VaultError::Validation(_))));

    let summary = harness
        .services
        .analytics
        .usage_summary(&admin, UsageQuery::default())
        .await?;
    assert_eq!(summary.days, 30);
    assert_eq!(summary.document_count, 2);
    assert_eq!(summary.trashed_count, 1);
    assert_eq!(summary.active_users, 2);
    assert_eq!(summary.uploads_per_day.iter().map(|d| d.count).sum::<i64>(), 3);
    assert_eq!(summary.top_uploaders.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_audit_failures_do_not_fail_the_action() -> anyhow::Result<()> {
    let harness = Harness::new();
    let admin = harness.register("Acme", "admin@acme.io").await;
    let member = harness.add_user(&admin, "member@acme.io", Role::Member).await;

    let before = harness.storage.audit_logs(admin.organization_id).len();
    harness.storage.fail_audit_inserts();

    harness.upload(&admin, "a.txt", b"a".to_vec(), None).await;
    assert_eq!(harness.storage.audit_logs(admin.organization_id).len(), before);

    let by_member = harness
        .services
        .audit
        .query(&member, AuditQuery::default())
        .await;
    assert!(matches!(by_member, Err(VaultError::Forbidden(_))));

    let page = harness
        .services
        .audit
        .query(
            &admin,
            AuditQuery {
                action: Some(AuditAction::UserCreate),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].entity_id, Some(member.user_id));
    Ok(())
}
