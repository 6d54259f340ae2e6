use assert_matches::assert_matches;
use cloudspend_db::models::user::CreateUser;
use cloudspend_db::repositories::UserRepo;
use sqlx::PgPool;

fn new_user(email: &str) -> CreateUser {
    CreateUser {
        email: email.to_string(),
        full_name: Some("Test User".to_string()),
        password_hash: "$argon2id$placeholder".to_string(),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn create_and_find_user(pool: PgPool) {
    cloudspend_db::health_check(&pool).await.unwrap();

    let user = UserRepo::create(&pool, &new_user("a@example.com")).await.unwrap();
    assert!(user.is_active);
    assert!(user.last_login_at.is_none());

    let by_email = UserRepo::find_by_email(&pool, "a@example.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);

    let by_id = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(by_id.full_name.as_deref(), Some("Test User"));

    assert!(UserRepo::find_by_email(&pool, "b@example.com").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_email_is_rejected(pool: PgPool) {
    UserRepo::create(&pool, &new_user("dup@example.com")).await.unwrap();
    let err = UserRepo::create(&pool, &new_user("dup@example.com")).await.unwrap_err();
    assert_matches!(
        err,
        sqlx::Error::Database(ref db) if db.constraint() == Some("uq_users_email")
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn login_timestamp_is_recorded(pool: PgPool) {
    let user = UserRepo::create(&pool, &new_user("c@example.com")).await.unwrap();
    UserRepo::record_successful_login(&pool, user.id).await.unwrap();
    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert!(user.last_login_at.is_some());
}
