use super::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// In-memory directory. Lookups of a fresh user miss `lag` times before it
/// becomes visible, and a deleted user stays visible for `lag` lookups.
#[derive(Default)]
struct FakeUsers {
    users: Mutex<HashMap<String, UserRecord>>,
    lingering: Mutex<HashMap<String, usize>>,
    hidden: Mutex<HashMap<String, usize>>,
    lag: usize,
    updates: Mutex<Vec<UpdateUserRequest>>,
    lookups: AtomicUsize,
}

impl FakeUsers {
    fn with_lag(lag: usize) -> Self {
        Self {
            lag,
            ..Default::default()
        }
    }

    fn insert(&self, record: UserRecord) {
        self.users
            .lock()
            .unwrap()
            .insert(record.local_id.clone(), record);
    }
}

#[async_trait]
impl UserManager for FakeUsers {
    async fn create_user(&self, request: CreateUserRequest) -> Result<UserRecord, AuthError> {
        let uid = request.local_id.unwrap_or_else(|| "generated-uid".to_string());
        let record = UserRecord {
            local_id: uid.clone(),
            email: request.email.map(|e| e.to_lowercase()),
            email_verified: request.email_verified.unwrap_or_default(),
            display_name: request.display_name,
            photo_url: request.photo_url,
            phone_number: request.phone_number,
            disabled: request.disabled.unwrap_or_default(),
        };
        self.hidden.lock().unwrap().insert(uid, self.lag);
        self.insert(record.clone());
        Ok(record)
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, AuthError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(left) = self.hidden.lock().unwrap().get_mut(uid) {
            if *left > 0 {
                *left -= 1;
                return Err(AuthError::UserNotFound);
            }
        }
        if let Some(left) = self.lingering.lock().unwrap().get_mut(uid) {
            if *left > 0 {
                *left -= 1;
                return Ok(UserRecord {
                    local_id: uid.to_string(),
                    ..Default::default()
                });
            }
        }
        self.users
            .lock()
            .unwrap()
            .get(uid)
            .cloned()
            .ok_or(AuthError::UserNotFound)
    }

    async fn update_user(&self, request: UpdateUserRequest) -> Result<UserRecord, AuthError> {
        let mut users = self.users.lock().unwrap();
        let record = users
            .get_mut(&request.local_id)
            .ok_or(AuthError::UserNotFound)?;

        if let Some(name) = &request.display_name {
            record.display_name = Some(name.clone());
        }
        if let Some(url) = &request.photo_url {
            record.photo_url = Some(url.clone());
        }
        if let Some(email) = &request.email {
            record.email = Some(email.to_lowercase());
            record.email_verified = false;
        }
        if let Some(phone) = &request.phone_number {
            record.phone_number = Some(phone.clone());
        }
        if let Some(disabled) = request.disabled {
            record.disabled = disabled;
        }
        if let Some(verified) = request.email_verified {
            record.email_verified = verified;
        }
        for attribute in request.delete_attribute.iter().flatten() {
            match attribute.as_str() {
                DELETE_ATTRIBUTE_DISPLAY_NAME => record.display_name = None,
                DELETE_ATTRIBUTE_PHOTO_URL => record.photo_url = None,
                _ => {}
            }
        }
        if request.delete_provider.is_some() {
            record.phone_number = None;
        }
        let record = record.clone();
        drop(users);

        self.updates.lock().unwrap().push(request);
        Ok(record)
    }

    async fn delete_user(&self, uid: &str) -> Result<(), AuthError> {
        self.users
            .lock()
            .unwrap()
            .remove(uid)
            .ok_or(AuthError::UserNotFound)?;
        self.lingering.lock().unwrap().insert(uid.to_string(), self.lag);
        Ok(())
    }
}

fn john_doe() -> UserAttributes {
    UserAttributes {
        uid: Some("2d5ae085-679b-4a92-89e7-97cced6d4c79".to_string()),
        display_name: Some("John Doe".to_string()),
        disabled: Some(false),
        email: Some("john.doe@example.com".to_string()),
        email_verified: Some(true),
        password: Some("password123".to_string()),
        phone_number: Some("+14155552671".to_string()),
        photo_url: Some(
            "http://www.example.com/2d5ae085-679b-4a92-89e7-97cced6d4c79/photo.png".to_string(),
        ),
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_for_user_to_appear() {
    let users = FakeUsers::with_lag(2);

    let state = create(&users, &john_doe(), &Timeouts::default())
        .await
        .unwrap();

    assert_eq!(state, john_doe());
    // Two misses, then the lookup that sees the user.
    assert_eq!(users.lookups.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_create_keeps_unset_attributes_null() {
    let users = FakeUsers::default();
    let planned = UserAttributes {
        email: Some("jane@example.com".to_string()),
        ..Default::default()
    };

    let state = create(&users, &planned, &Timeouts::default()).await.unwrap();

    assert_eq!(
        state,
        UserAttributes {
            uid: Some("generated-uid".to_string()),
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_times_out() {
    let users = FakeUsers::with_lag(usize::MAX);
    let timeouts = Timeouts {
        create: Duration::from_secs(30),
        ..Timeouts::default()
    };

    let err = create(&users, &john_doe(), &timeouts).await.unwrap_err();

    match &err {
        UserError::Wait {
            uid,
            action,
            source,
            ..
        } => {
            assert_eq!(uid, "2d5ae085-679b-4a92-89e7-97cced6d4c79");
            assert_eq!(*action, "created");
            assert!(matches!(source, WaitError::Timeout { .. }));
        }
        other => panic!("expected wait error, got {other:?}"),
    }
    assert!(err.to_string().starts_with(
        "error waiting for user (2d5ae085-679b-4a92-89e7-97cced6d4c79) to be created"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_create_wait_failure_keeps_created_user() {
    let users = FakeUsers::with_lag(usize::MAX);
    let planned = UserAttributes {
        uid: None,
        password: Some("password123".to_string()),
        ..Default::default()
    };

    let err = create(&users, &planned, &Timeouts::default())
        .await
        .unwrap_err();

    let state = err.created_state().unwrap();
    assert_eq!(state.uid.as_deref(), Some("generated-uid"));
    assert_eq!(state.password.as_deref(), Some("password123"));
}

#[tokio::test(start_paused = true)]
async fn test_create_keeps_email_case() {
    let users = FakeUsers::default();
    let planned = UserAttributes {
        email: Some("John.Doe@Example.com".to_string()),
        ..Default::default()
    };

    let state = create(&users, &planned, &Timeouts::default()).await.unwrap();
    assert_eq!(state.email.as_deref(), Some("John.Doe@Example.com"));

    let state = read(&users, "generated-uid", &state).await.unwrap();
    assert_eq!(state.email.as_deref(), Some("John.Doe@Example.com"));
}

#[tokio::test]
async fn test_read_reports_changed_email() {
    let users = FakeUsers::default();
    users.insert(UserRecord {
        local_id: "uid-1".to_string(),
        email: Some("other@example.com".to_string()),
        ..Default::default()
    });

    let prior = UserAttributes {
        email: Some("John@Example.com".to_string()),
        ..Default::default()
    };
    let state = read(&users, "uid-1", &prior).await.unwrap();
    assert_eq!(state.email.as_deref(), Some("other@example.com"));
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_for_user_to_disappear() {
    let users = FakeUsers::with_lag(3);
    users.insert(UserRecord {
        local_id: "uid-1".to_string(),
        ..Default::default()
    });

    delete(&users, "uid-1", &Timeouts::default()).await.unwrap();

    assert_eq!(users.lookups.load(Ordering::SeqCst), 4);
    assert!(matches!(
        users.get_user("uid-1").await,
        Err(AuthError::UserNotFound)
    ));
}

#[tokio::test]
async fn test_delete_missing_user_is_noop() {
    let users = FakeUsers::default();
    delete(&users, "gone", &Timeouts::default()).await.unwrap();
    assert_eq!(users.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_read_maps_record() {
    let users = FakeUsers::default();
    users.insert(UserRecord {
        local_id: "uid-1".to_string(),
        email: Some("a@example.com".to_string()),
        display_name: Some(String::new()),
        disabled: true,
        ..Default::default()
    });

    let prior = UserAttributes {
        uid: Some("uid-1".to_string()),
        password: Some("secret-pass".to_string()),
        email_verified: Some(false),
        ..Default::default()
    };
    let state = read(&users, "uid-1", &prior).await.unwrap();

    assert_eq!(
        state,
        UserAttributes {
            uid: Some("uid-1".to_string()),
            display_name: None,
            disabled: Some(true),
            email: Some("a@example.com".to_string()),
            email_verified: Some(false),
            password: Some("secret-pass".to_string()),
            phone_number: None,
            photo_url: None,
        }
    );
}

#[tokio::test]
async fn test_read_missing_user() {
    let users = FakeUsers::default();
    let err = read(&users, "nope", &UserAttributes::default())
        .await
        .unwrap_err();
    assert!(matches!(err, UserError::Auth(AuthError::UserNotFound)));
}

#[tokio::test]
async fn test_update_without_changes_skips_remote_call() {
    let users = FakeUsers::default();
    let state = update(&users, "uid-1", &john_doe(), &john_doe())
        .await
        .unwrap();

    assert_eq!(state, john_doe());
    assert!(users.updates.lock().unwrap().is_empty());
    assert_eq!(users.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_update_sends_only_changes() {
    let users = FakeUsers::default();
    let uid = "2d5ae085-679b-4a92-89e7-97cced6d4c79";
    users.insert(UserRecord {
        local_id: uid.to_string(),
        email: Some("john.doe@example.com".to_string()),
        email_verified: true,
        display_name: Some("John Doe".to_string()),
        photo_url: john_doe().photo_url,
        phone_number: Some("+14155552671".to_string()),
        disabled: false,
    });

    let planned = UserAttributes {
        display_name: None,
        disabled: Some(true),
        phone_number: None,
        ..john_doe()
    };
    let state = update(&users, uid, &john_doe(), &planned).await.unwrap();

    assert_eq!(state, planned);
    let updates = users.updates.lock().unwrap();
    assert_eq!(
        updates.as_slice(),
        &[UpdateUserRequest {
            disabled: Some(true),
            delete_attribute: Some(vec![DELETE_ATTRIBUTE_DISPLAY_NAME.to_string()]),
            delete_provider: Some(vec![PHONE_PROVIDER_ID.to_string()]),
            ..UpdateUserRequest::new(uid)
        }]
    );
}

#[tokio::test]
async fn test_update_email_keeps_verification() {
    let users = FakeUsers::default();
    let uid = "uid-1";
    users.insert(UserRecord {
        local_id: uid.to_string(),
        email: Some("old@example.com".to_string()),
        email_verified: true,
        ..Default::default()
    });

    let prior = UserAttributes {
        uid: Some(uid.to_string()),
        email: Some("old@example.com".to_string()),
        email_verified: Some(true),
        ..Default::default()
    };
    let planned = UserAttributes {
        email: Some("new@example.com".to_string()),
        ..prior.clone()
    };
    let state = update(&users, uid, &prior, &planned).await.unwrap();

    assert_eq!(state, planned);
    let updates = users.updates.lock().unwrap();
    assert_eq!(updates[0].email.as_deref(), Some("new@example.com"));
    assert_eq!(updates[0].email_verified, Some(true));
}

#[test]
fn test_check_email_kept() {
    let email = Some("a@example.com".to_string());
    assert!(check_email_kept("uid-1", &email, &email).is_ok());
    assert!(check_email_kept("uid-1", &None, &None).is_ok());
    assert!(check_email_kept("uid-1", &Some(String::new()), &None).is_ok());
    assert!(matches!(
        check_email_kept("uid-1", &email, &Some(String::new())),
        Err(UserError::EmailRemoval(_))
    ));
}

#[test]
fn test_update_request_rejects_email_removal() {
    let planned = UserAttributes {
        email: None,
        ..john_doe()
    };
    let err = update_request("uid-1", &john_doe(), &planned).unwrap_err();
    assert!(matches!(err, UserError::EmailRemoval(uid) if uid == "uid-1"));
}

#[test]
fn test_update_request_never_clears_password() {
    let planned = UserAttributes {
        password: None,
        ..john_doe()
    };
    let request = update_request("uid-1", &john_doe(), &planned).unwrap();
    assert!(request.is_empty());

    let planned = UserAttributes {
        password: Some("new-password".to_string()),
        ..john_doe()
    };
    let request = update_request("uid-1", &john_doe(), &planned).unwrap();
    assert_eq!(request.password.as_deref(), Some("new-password"));
}

#[tokio::test]
async fn test_import_reads_user() {
    let users = FakeUsers::default();
    users.insert(UserRecord {
        local_id: "uid-1".to_string(),
        email: Some("a@example.com".to_string()),
        ..Default::default()
    });

    let state = import(&users, "uid-1").await.unwrap();
    assert_eq!(state.uid.as_deref(), Some("uid-1"));
    assert_eq!(state.email.as_deref(), Some("a@example.com"));
    assert_eq!(state.password, None);
    assert_eq!(state.disabled, None);
}

#[test]
fn test_validate_collects_all_errors() {
    let attributes = UserAttributes {
        uid: Some(String::new()),
        email: Some("not-an-email".to_string()),
        password: Some("short".to_string()),
        phone_number: Some("555-1234".to_string()),
        photo_url: Some("photo.png".to_string()),
        ..Default::default()
    };

    let keys: Vec<_> = attributes
        .validate()
        .iter()
        .map(|e| e.key().to_string())
        .collect();
    assert_eq!(keys, ["uid", "email", "password", "phone_number", "photo_url"]);
    assert!(john_doe().validate().is_empty());
}
