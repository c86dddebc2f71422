//! Walks through the Accounts/People/Companies fixture used throughout this
//! crate's test suite: a small inheritance DAG where `People` and
//! `Companies` both extend `Accounts`, so an item created as a `Person` is
//! simultaneously visible through the `accounts` collection.

use std::any::Any;

use objrepo::{downcast_ref, CollectionClass, FindOptions, GetOptions, Item, PutOptions, Repository, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct Account {
    id: String,
    name: String,
    is_new: bool,
}

impl Item for Account {
    fn class_name(&self) -> &'static str {
        "Accounts"
    }

    fn class_chain(&self) -> &'static [&'static str] {
        &["Accounts"]
    }

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn serialize(&self) -> Value {
        json!({ "name": self.name })
    }

    fn replace_value(&mut self, record: &Value) -> Result<()> {
        self.name = record["name"].as_str().unwrap_or_default().to_string();
        Ok(())
    }

    fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Accounts;

impl CollectionClass for Accounts {
    type Item = Account;
    const NAME: &'static str = "Accounts";

    fn class_chain() -> &'static [&'static str] {
        &["Accounts"]
    }

    fn from_record(key: &str, record: &Value) -> Result<Account> {
        Ok(Account {
            id: key.to_string(),
            name: record["name"].as_str().unwrap_or_default().to_string(),
            is_new: false,
        })
    }
}

#[derive(Debug, Clone)]
struct Person {
    id: String,
    name: String,
    age: i64,
    is_new: bool,
}

impl Item for Person {
    fn class_name(&self) -> &'static str {
        "People"
    }

    fn class_chain(&self) -> &'static [&'static str] {
        &["People", "Accounts"]
    }

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn serialize(&self) -> Value {
        json!({ "name": self.name, "age": self.age })
    }

    fn replace_value(&mut self, record: &Value) -> Result<()> {
        self.name = record["name"].as_str().unwrap_or_default().to_string();
        self.age = record["age"].as_i64().unwrap_or_default();
        Ok(())
    }

    fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct People;

impl CollectionClass for People {
    type Item = Person;
    const NAME: &'static str = "People";

    fn class_chain() -> &'static [&'static str] {
        &["People", "Accounts"]
    }

    fn from_record(key: &str, record: &Value) -> Result<Person> {
        Ok(Person {
            id: key.to_string(),
            name: record["name"].as_str().unwrap_or_default().to_string(),
            age: record["age"].as_i64().unwrap_or_default(),
            is_new: false,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let repo = Repository::builder("quickstart", "memory://quickstart")
        .register::<Accounts>()
        .register::<People>()
        .build();
    repo.initialize().await?;

    let people = repo.collection::<People>();
    let mut alice = Person {
        id: "aaa".to_string(),
        name: "Alice".to_string(),
        age: 30,
        is_new: true,
    };
    people.put_item(&mut alice, PutOptions::default()).await?;

    // `alice` is visible through the base `Accounts` collection too, since
    // `People` is one of its derived classes.
    let accounts = repo.collection::<Accounts>();
    let fetched = accounts.get_item("aaa", GetOptions::default()).await?.unwrap();
    println!("found account named {}", fetched.serialize()["name"]);
    if let Some(person) = downcast_ref::<Person>(fetched.as_ref()) {
        println!("materialized at its true class: age {}", person.age);
    }

    let adults = people
        .find_items(&FindOptions::new().query_eq("name", "Alice"))
        .await?;
    println!("query matched {} item(s)", adults.len());

    repo.destroy_repository().await?;
    Ok(())
}
