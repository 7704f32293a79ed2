use super::*;

#[tokio::test]
async fn test_insert_and_get_contact() {
    let (db, _temp) = test_db().await;

    let mut contact = new_contact(SourcePool::Brokers, "Omar", Some("+971 50 111 2222"));
    contact.tags = vec!["vip".into(), "marina".into()];
    contact.company = Some("Gulf Realty".into());
    contact.priority = Priority::High;
    contact.contact_type = ContactType::Broker;

    let id = db.insert_contact(&contact).await.unwrap();
    let stored = db.get_contact(id).await.unwrap().unwrap();

    assert_eq!(stored.id, id);
    assert_eq!(stored.source_pool, SourcePool::Brokers);
    assert_eq!(stored.phone.as_deref(), Some("+971 50 111 2222"));
    assert_eq!(stored.tags, vec!["vip".to_string(), "marina".to_string()]);
    assert_eq!(stored.priority, Priority::High);
    assert_eq!(stored.contact_type, ContactType::Broker);
}

#[tokio::test]
async fn test_list_pool_contacts_only_returns_live_contacts_of_pool() {
    let (db, _temp) = test_db().await;

    let a = db
        .insert_contact(&new_contact(SourcePool::Owners, "A", Some("0501")))
        .await
        .unwrap();
    let b = db
        .insert_contact(&new_contact(SourcePool::Owners, "B", Some("0502")))
        .await
        .unwrap();
    db.insert_contact(&new_contact(SourcePool::Tenants, "C", Some("0503")))
        .await
        .unwrap();

    db.retire_contact(SourcePool::Owners, a).await.unwrap();

    let owners = db.list_pool_contacts(SourcePool::Owners).await.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].id, b);
}

#[tokio::test]
async fn test_retire_through_wrong_pool_or_twice_fails() {
    let (db, _temp) = test_db().await;
    let id = db
        .insert_contact(&new_contact(SourcePool::Clients, "D", None))
        .await
        .unwrap();

    assert!(db.retire_contact(SourcePool::Tenants, id).await.is_err());
    db.retire_contact(SourcePool::Clients, id).await.unwrap();
    assert!(matches!(
        db.retire_contact(SourcePool::Clients, id).await,
        Err(crate::Error::Database(crate::error::DatabaseError::NotFound(_)))
    ));
}
