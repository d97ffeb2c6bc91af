use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use coursehub::{
    build_router,
    models::{
        course::{Course, CoursePatch},
        entity::{Entity, EntityPatch, NewEntity, Role},
    },
    repositories::{
        memory::{MemoryCourseRepository, MemoryEntityRepository},
        CourseRepository, EntityRepository, StoreError, StoreResult,
    },
    AppState, Config,
};

const BOUNDARY: &str = "coursehub-test-boundary";
const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

// Shared test context: an in-process router over in-memory stores.
struct TestContext {
    router: Router,
    uploads: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::build(&[], Arc::new(MemoryCourseRepository::new()))
    }

    fn build(overrides: &[(&str, &str)], courses: Arc<dyn CourseRepository>) -> Self {
        Self::build_with(overrides, Arc::new(MemoryEntityRepository::new()), courses)
    }

    fn build_with(
        overrides: &[(&str, &str)],
        entities: Arc<dyn EntityRepository>,
        courses: Arc<dyn CourseRepository>,
    ) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let config = test_config(uploads.path(), overrides);
        let state = AppState::new(config, entities, courses).unwrap();

        Self {
            router: build_router(state),
            uploads,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn register(&self, email: &str, role: &str) -> Value {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/register",
                None,
                json!({
                    "firstName": "Test",
                    "lastName": "User",
                    "email": email,
                    "password": "secret123",
                    "type": role
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "Registration failed: {body}");
        body["entity"].clone()
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(json_request(
            "POST",
            "/api/auth",
            None,
            json!({ "email": email, "password": password }),
        ))
        .await
    }

    async fn token_for(&self, email: &str) -> String {
        let (status, body) = self.login(email, "secret123").await;
        assert_eq!(status, StatusCode::OK, "Login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_course(&self, token: &str, title: &str) -> (StatusCode, Value) {
        self.send(json_request(
            "POST",
            "/api/courses",
            Some(token),
            json!({ "title": title, "description": "An intro to algebra" }),
        ))
        .await
    }

    fn stored_files(&self) -> Vec<String> {
        let mut files: Vec<String> = std::fs::read_dir(self.uploads.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        files.sort();
        files
    }
}

fn test_config(upload_dir: &Path, overrides: &[(&str, &str)]) -> Config {
    let upload_dir = upload_dir.to_string_lossy().to_string();
    let overrides: Vec<(String, String)> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Config::from_lookup(move |key| {
        if let Some((_, value)) = overrides.iter().find(|(k, _)| k == key) {
            return Some(value.clone());
        }
        match key {
            "DATABASE_URL" => Some("postgres://unused@localhost/unused".to_string()),
            "JWT_SECRET" => Some("integration-test-secret".to_string()),
            "UPLOAD_DIR" => Some(upload_dir.clone()),
            _ => None,
        }
    })
    .unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

struct FilePart<'a> {
    field: &'a str,
    file_name: &'a str,
    content_type: &'a str,
    bytes: &'a [u8],
}

fn multipart_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

fn course_fields() -> [(&'static str, &'static str); 2] {
    [
        ("title", "Algebra Basics"),
        ("description", "An intro to algebra"),
    ]
}

fn png_part(field: &str) -> FilePart<'_> {
    FilePart {
        field,
        file_name: "cover.png",
        content_type: "image/png",
        bytes: PNG_BYTES,
    }
}

/// Course store whose inserts always fail, for exercising upload rollback.
#[derive(Default)]
struct FailingCourseRepository {
    inner: MemoryCourseRepository,
}

#[async_trait]
impl CourseRepository for FailingCourseRepository {
    async fn create(&self, _course: Course) -> StoreResult<Course> {
        Err(StoreError::Unavailable("insert refused".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Course>> {
        self.inner.find_by_id(id).await
    }

    async fn list_all(&self) -> StoreResult<Vec<Course>> {
        self.inner.list_all().await
    }

    async fn list_by_teacher(&self, teacher_id: Uuid) -> StoreResult<Vec<Course>> {
        self.inner.list_by_teacher(teacher_id).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: CoursePatch,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Course>> {
        self.inner.update(id, patch, updated_at).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete(id).await
    }
}

/// Account store that can register and look up by email, but whose reads
/// by id, updates and listings fail.
#[derive(Default)]
struct FailingEntityRepository {
    inner: MemoryEntityRepository,
}

#[async_trait]
impl EntityRepository for FailingEntityRepository {
    async fn create(&self, entity: NewEntity) -> StoreResult<Entity> {
        self.inner.create(entity).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Entity>> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, _id: Uuid) -> StoreResult<Option<Entity>> {
        Err(StoreError::Unavailable("read refused".to_string()))
    }

    async fn update(&self, _id: Uuid, _patch: EntityPatch) -> StoreResult<Option<Entity>> {
        Err(StoreError::Unavailable("update refused".to_string()))
    }

    async fn list_by_role(&self, _role: Role) -> StoreResult<Vec<Entity>> {
        Err(StoreError::Unavailable("listing refused".to_string()))
    }
}

fn register_form(email: &str) -> [(&str, &str); 3] {
    [("email", email), ("password", "secret123"), ("type", "student")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_teacher_course_lifecycle() {
        let context = TestContext::new();

        // Step 1: Register and log in two teachers
        let owner = context.register("t@x.com", "teacher").await;
        assert_eq!(owner["type"], "teacher");
        assert!(owner.get("password").is_none(), "Password hash leaked");
        context.register("other@x.com", "teacher").await;

        let (status, login) = context.login("t@x.com", "secret123").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(login["user"]["id"], owner["id"]);
        assert_eq!(login["user"]["type"], "teacher");
        let owner_token = login["token"].as_str().unwrap().to_string();
        let other_token = context.token_for("other@x.com").await;

        // Step 2: Create two courses
        let (status, created) = context.create_course(&owner_token, "Algebra Basics").await;
        assert_eq!(status, StatusCode::CREATED, "Course creation failed: {created}");
        assert_eq!(created["course"]["teacherId"], owner["id"]);
        assert_eq!(created["course"]["teacher"]["email"], "t@x.com");
        assert_eq!(created["imageUrl"], Value::Null);
        let first_id = created["course"]["id"].as_str().unwrap().to_string();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let (status, _) = context.create_course(&owner_token, "Geometry Basics").await;
        assert_eq!(status, StatusCode::CREATED);

        // Step 3: Public listing is newest first
        let (status, listing) = context.send(bare_request("GET", "/api/courses", None)).await;
        assert_eq!(status, StatusCode::OK);
        let titles: Vec<&str> = listing
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Geometry Basics", "Algebra Basics"]);

        // Step 4: A different teacher cannot delete it
        let uri = format!("/api/courses/{first_id}");
        let (status, body) = context
            .send(bare_request("DELETE", &uri, Some(&format!("Bearer {other_token}"))))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You can only delete your own courses");

        // Step 5: The owner can
        let (status, body) = context
            .send(bare_request("DELETE", &uri, Some(&format!("Bearer {owner_token}"))))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Course deleted successfully");

        let (status, _) = context
            .send(bare_request("DELETE", &uri, Some(&format!("Bearer {owner_token}"))))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Step 6: Other teacher's list is empty, owner's has one left
        let (status, mine) = context
            .send(bare_request(
                "GET",
                "/api/courses/my",
                Some(&format!("Bearer {other_token}")),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine, json!([]));

        let (_, mine) = context
            .send(bare_request(
                "GET",
                "/api/courses/my",
                Some(&format!("Bearer {owner_token}")),
            ))
            .await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_course_validation_messages() {
        let context = TestContext::new();
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let (status, body) = context.create_course(&token, "Ab").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Title must be at least 3 characters long");

        let (status, body) = context
            .send(json_request(
                "POST",
                "/api/courses",
                Some(&token),
                json!({ "title": "Algebra Basics" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Title and description are required");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let context = TestContext::new();
        context.register("s@x.com", "student").await;

        let (status, body) = context
            .send(json_request(
                "POST",
                "/api/register",
                None,
                json!({ "email": "s@x.com", "password": "different123" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "email already exists");

        // The original password still works, the second one never stored
        assert_eq!(context.login("s@x.com", "secret123").await.0, StatusCode::OK);
        assert_eq!(
            context.login("s@x.com", "different123").await.0,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let context = TestContext::new();
        context.register("s@x.com", "student").await;

        let (unknown_status, unknown) = context.login("nobody@x.com", "secret123").await;
        let (wrong_status, wrong) = context.login("s@x.com", "wrong-password").await;

        assert_eq!(unknown_status, StatusCode::BAD_REQUEST);
        assert_eq!(wrong_status, StatusCode::BAD_REQUEST);
        assert_eq!(unknown, wrong);
        assert_eq!(wrong["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_registration_rejects_unknown_type() {
        let context = TestContext::new();

        let (status, body) = context
            .send(json_request(
                "POST",
                "/api/register",
                None,
                json!({ "email": "a@x.com", "password": "secret123", "type": "admin" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid entity type");
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer_token() {
        let context = TestContext::new();
        context.register("s@x.com", "student").await;
        let token = context.token_for("s@x.com").await;

        let bad_headers = [
            None,
            Some("Basic abc".to_string()),
            Some("Bearer".to_string()),
            Some(format!("Token {token}")),
            Some("Bearer not.a.token".to_string()),
            Some(format!("Bearer {token} extra")),
        ];

        for value in bad_headers {
            let (status, body) = context
                .send(bare_request("GET", "/api/entity", value.as_deref()))
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "header {value:?}");
            assert_eq!(body["message"], "Unauthorized");
        }

        let (status, body) = context
            .send(bare_request(
                "GET",
                "/api/entity",
                Some(&format!("Bearer {token}")),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "s@x.com");
    }

    #[tokio::test]
    async fn test_student_listing_is_for_teachers() {
        let context = TestContext::new();
        context.register("s@x.com", "student").await;
        context.register("t@x.com", "teacher").await;
        let student_token = context.token_for("s@x.com").await;
        let teacher_token = context.token_for("t@x.com").await;

        let (status, body) = context
            .send(bare_request(
                "GET",
                "/api/students",
                Some(&format!("Bearer {student_token}")),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "unauthorized");

        let (status, body) = context
            .send(bare_request(
                "GET",
                "/api/students",
                Some(&format!("Bearer {teacher_token}")),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let students = body.as_array().unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0]["email"], "s@x.com");
        assert!(students[0].get("password").is_none());
    }

    #[tokio::test]
    async fn test_students_cannot_author_courses() {
        let context = TestContext::new();
        context.register("s@x.com", "student").await;
        let token = context.token_for("s@x.com").await;

        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(png_part("lessonImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Only teachers can create courses");
        assert!(context.stored_files().is_empty(), "Nothing should be staged");

        let (status, _) = context
            .send(bare_request(
                "GET",
                "/api/courses/my",
                Some(&format!("Bearer {token}")),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_profile_update_keeps_role_and_rehashes_password() {
        let context = TestContext::new();
        context.register("s@x.com", "student").await;
        let token = context.token_for("s@x.com").await;

        let (status, body) = context
            .send(json_request(
                "PUT",
                "/api/entity",
                Some(&token),
                json!({ "type": "teacher" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Entity type cannot be changed");

        let (status, body) = context
            .send(json_request(
                "PUT",
                "/api/entity",
                Some(&token),
                json!({ "firstName": "Grace", "password": "new-secret-1", "age": 30 }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "Update failed: {body}");
        assert_eq!(body["firstName"], "Grace");
        assert_eq!(body["age"], 30);
        assert_eq!(body["type"], "student");

        assert_eq!(
            context.login("s@x.com", "secret123").await.0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            context.login("s@x.com", "new-secret-1").await.0,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_course_image_upload_is_stored_and_served() {
        let context = TestContext::new();
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(png_part("lessonImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "Upload failed: {body}");

        let image_url = body["imageUrl"].as_str().unwrap().to_string();
        assert!(image_url.starts_with("/uploads/lesson-"));
        assert!(image_url.ends_with(".png"));
        assert_eq!(context.stored_files().len(), 1);

        // The record holds a public reference, not the server's upload directory
        let stored = body["course"]["image"].as_str().unwrap();
        assert_eq!(format!("/{stored}"), image_url);
        assert!(!stored.contains(&*context.uploads.path().to_string_lossy()));

        let response = context
            .router
            .clone()
            .oneshot(bare_request("GET", &image_url, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let served = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&served[..], PNG_BYTES);
    }

    #[tokio::test]
    async fn test_mismatched_declared_type_is_rejected() {
        let context = TestContext::new();
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(FilePart {
                    field: "lessonImage",
                    file_name: "cover.png",
                    content_type: "application/pdf",
                    bytes: PNG_BYTES,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "unsupported_type");
        assert_eq!(
            body["message"],
            "Only image files (jpeg, jpg, png, gif, webp) are allowed!"
        );
        assert!(context.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_and_removed() {
        let context = TestContext::build(
            &[("COURSE_IMAGE_MAX_BYTES", "1024")],
            Arc::new(MemoryCourseRepository::new()),
        );
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let mut large = PNG_BYTES.to_vec();
        large.resize(4096, 0);

        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(FilePart {
                    field: "lessonImage",
                    file_name: "cover.png",
                    content_type: "image/png",
                    bytes: &large,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "file_too_large");
        assert!(context.stored_files().is_empty());

        let (_, listing) = context.send(bare_request("GET", "/api/courses", None)).await;
        assert_eq!(listing, json!([]));
    }

    #[tokio::test]
    async fn test_unexpected_file_field_is_rejected() {
        let context = TestContext::new();
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(png_part("attachment")),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "unexpected_field");
        assert!(context.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_failed_course_create_discards_upload() {
        let context = TestContext::build(&[], Arc::new(FailingCourseRepository::default()));
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(png_part("lessonImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Database error");
        assert!(context.stored_files().is_empty(), "Staged file was orphaned");
    }

    #[tokio::test]
    async fn test_course_update_rules() {
        let context = TestContext::new();
        context.register("t@x.com", "teacher").await;
        context.register("other@x.com", "teacher").await;
        let owner_token = context.token_for("t@x.com").await;
        let other_token = context.token_for("other@x.com").await;

        let (_, created) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&owner_token),
                &course_fields(),
                Some(png_part("lessonImage")),
            ))
            .await;
        let course = &created["course"];
        let uri = format!("/api/courses/{}", course["id"].as_str().unwrap());
        let first_image = created["imageUrl"].as_str().unwrap().to_string();

        // Missing course is a 404 even for a teacher
        let (status, body) = context
            .send(json_request(
                "PUT",
                &format!("/api/courses/{}", Uuid::new_v4()),
                Some(&owner_token),
                json!({ "title": "Linear Algebra" }),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Course not found");

        // Not the owner
        let (status, body) = context
            .send(json_request(
                "PUT",
                &uri,
                Some(&other_token),
                json!({ "title": "Linear Algebra" }),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You can only update your own courses");

        // Owner replaces the title and the image
        let (status, body) = context
            .send(multipart_request(
                "PUT",
                &uri,
                Some(&owner_token),
                &[("title", "Linear Algebra"), ("description", "")],
                Some(png_part("lessonImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "Update failed: {body}");
        assert_eq!(body["message"], "Course updated successfully");
        assert_eq!(body["course"]["title"], "Linear Algebra");
        assert_eq!(body["course"]["description"], "An intro to algebra");
        assert_eq!(body["course"]["teacherId"], course["teacherId"]);

        let updated_at: DateTime<Utc> =
            body["course"]["updatedAt"].as_str().unwrap().parse().unwrap();
        let created_at: DateTime<Utc> =
            body["course"]["createdAt"].as_str().unwrap().parse().unwrap();
        assert!(updated_at >= created_at);

        // The replaced image is gone, only the new one remains
        let files = context.stored_files();
        assert_eq!(files.len(), 1);
        assert!(!first_image.ends_with(&files[0]));
    }

    #[tokio::test]
    async fn test_registration_with_profile_image() {
        let context = TestContext::new();

        // Step 1: Register with a profile image
        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/register",
                None,
                &register_form("s@x.com"),
                Some(png_part("profileImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "Registration failed: {body}");
        let files = context.stored_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("profile-"));
        assert_eq!(body["entity"]["profileImage"], format!("uploads/{}", files[0]));

        // Step 2: A duplicate registration leaves no second file behind
        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/register",
                None,
                &register_form("s@x.com"),
                Some(png_part("profileImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "email already exists");
        assert_eq!(context.stored_files(), files, "Staged file was orphaned");

        // Step 3: An invalid registration leaves nothing behind either
        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/register",
                None,
                &[("email", "other@x.com"), ("password", "secret123"), ("type", "admin")],
                Some(png_part("profileImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid entity type");
        assert_eq!(context.stored_files(), files);
    }

    #[tokio::test]
    async fn test_profile_image_replacement_and_rollback() {
        let context = TestContext::new();
        context.register("s@x.com", "student").await;
        context.register("taken@x.com", "student").await;
        let token = context.token_for("s@x.com").await;

        // Step 1: First upload replaces the shared default
        let (status, first) = context
            .send(multipart_request(
                "PUT",
                "/api/entity",
                Some(&token),
                &[("firstName", "Ada")],
                Some(png_part("profileImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "Update failed: {first}");
        assert_eq!(first["firstName"], "Ada");
        let first_files = context.stored_files();
        assert_eq!(first_files.len(), 1);
        assert_eq!(first["profileImage"], format!("uploads/{}", first_files[0]));

        // Step 2: A second upload removes the first file
        let (status, second) = context
            .send(multipart_request(
                "PUT",
                "/api/entity",
                Some(&token),
                &[],
                Some(png_part("profileImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "Update failed: {second}");
        let second_files = context.stored_files();
        assert_eq!(second_files.len(), 1);
        assert_ne!(second_files, first_files);
        assert_eq!(second["profileImage"], format!("uploads/{}", second_files[0]));

        // Step 3: A failed update discards its upload and keeps the current image
        let (status, body) = context
            .send(multipart_request(
                "PUT",
                "/api/entity",
                Some(&token),
                &[("email", "taken@x.com")],
                Some(png_part("profileImage")),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "email already exists");
        assert_eq!(context.stored_files(), second_files);

        let (_, profile) = context
            .send(bare_request(
                "GET",
                "/api/entity",
                Some(&format!("Bearer {token}")),
            ))
            .await;
        assert_eq!(profile["profileImage"], second["profileImage"]);
        assert_eq!(profile["email"], "s@x.com");
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_rejected() {
        let context = TestContext::new();
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/courses")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from("title=Algebra"))
            .unwrap();

        let (status, body) = context.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "malformed_multipart");
        assert!(context.stored_files().is_empty());
    }

    #[tokio::test]
    async fn test_default_course_image_ceiling_is_inclusive() {
        const TEN_MIB: usize = 10 * 1024 * 1024;
        let context = TestContext::new();
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;

        let mut image = PNG_BYTES.to_vec();
        image.resize(TEN_MIB, 0);

        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(FilePart {
                    field: "lessonImage",
                    file_name: "cover.png",
                    content_type: "image/png",
                    bytes: &image,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "Upload at the ceiling failed: {body}");
        assert_eq!(context.stored_files().len(), 1);

        image.push(0);
        let (status, body) = context
            .send(multipart_request(
                "POST",
                "/api/courses",
                Some(&token),
                &course_fields(),
                Some(FilePart {
                    field: "lessonImage",
                    file_name: "cover.png",
                    content_type: "image/png",
                    bytes: &image,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "file_too_large");
        assert_eq!(body["message"], "File too large. Maximum size is 10MB.");
        assert_eq!(context.stored_files().len(), 1);
    }

    #[tokio::test]
    async fn test_account_store_failures_are_client_errors() {
        let context = TestContext::build_with(
            &[],
            Arc::new(FailingEntityRepository::default()),
            Arc::new(MemoryCourseRepository::new()),
        );
        context.register("t@x.com", "teacher").await;
        let token = context.token_for("t@x.com").await;
        let bearer = format!("Bearer {token}");

        let (status, body) = context
            .send(bare_request("GET", "/api/students", Some(&bearer)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Students not found");

        let (status, body) = context
            .send(bare_request("GET", "/api/entity", Some(&bearer)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Entity not found");

        let (status, body) = context
            .send(json_request(
                "PUT",
                "/api/entity",
                Some(&token),
                json!({ "firstName": "Grace" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Entity not found");
    }

    #[tokio::test]
    async fn test_health() {
        let context = TestContext::new();
        let (status, body) = context.send(bare_request("GET", "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "msg": "ok" }));
    }
}
