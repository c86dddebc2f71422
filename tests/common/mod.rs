//! Shared fixtures for the integration suite: a small `Accounts` base class
//! with `People` and `Companies` both extending it, matching the
//! multi-inheritance scenario exercised across the test files in this
//! directory.

use std::any::Any;

use objrepo::{CollectionClass, Item, PutOptions, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub is_new: bool,
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

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_new: true,
        }
    }
}

pub struct Accounts;

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

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub is_new: bool,
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

impl Person {
    pub fn new(id: impl Into<String>, name: impl Into<String>, age: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
            is_new: true,
        }
    }
}

pub struct People;

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

#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub employee_count: i64,
    pub is_new: bool,
}

impl Item for Company {
    fn class_name(&self) -> &'static str {
        "Companies"
    }

    fn class_chain(&self) -> &'static [&'static str] {
        &["Companies", "Accounts"]
    }

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn serialize(&self) -> Value {
        json!({ "name": self.name, "employee_count": self.employee_count })
    }

    fn replace_value(&mut self, record: &Value) -> Result<()> {
        self.name = record["name"].as_str().unwrap_or_default().to_string();
        self.employee_count = record["employee_count"].as_i64().unwrap_or_default();
        Ok(())
    }

    fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>, employee_count: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            employee_count,
            is_new: true,
        }
    }
}

pub struct Companies;

impl CollectionClass for Companies {
    type Item = Company;
    const NAME: &'static str = "Companies";

    fn class_chain() -> &'static [&'static str] {
        &["Companies", "Accounts"]
    }

    fn from_record(key: &str, record: &Value) -> Result<Company> {
        Ok(Company {
            id: key.to_string(),
            name: record["name"].as_str().unwrap_or_default().to_string(),
            employee_count: record["employee_count"].as_i64().unwrap_or_default(),
            is_new: false,
        })
    }
}

/// Builds and initializes a repository with `Accounts`, `People` and
/// `Companies` registered, ready for the aaa..fff fixture to be populated.
pub async fn fixture_repository(name: &str) -> objrepo::RepositoryHandle {
    let repo = objrepo::Repository::builder(name, format!("memory://{name}"))
        .register::<Accounts>()
        .register::<People>()
        .register::<Companies>()
        .build();
    repo.initialize().await.expect("initialize fixture repository");
    repo
}

/// Populates the aaa/bbb/ccc People and ddd/eee/fff Companies fixture used
/// across the query and count test scenarios.
pub async fn populate_aaa_to_fff(repo: &objrepo::RepositoryHandle) {
    let people = repo.collection::<People>();
    let mut aaa = Person::new("aaa", "Alice", 30);
    let mut bbb = Person::new("bbb", "Bob", 40);
    let mut ccc = Person::new("ccc", "Carol", 50);
    people.put_item(&mut aaa, PutOptions::default()).await.unwrap();
    people.put_item(&mut bbb, PutOptions::default()).await.unwrap();
    people.put_item(&mut ccc, PutOptions::default()).await.unwrap();

    let companies = repo.collection::<Companies>();
    let mut ddd = Company::new("ddd", "Dynabyte", 10);
    let mut eee = Company::new("eee", "Enright", 20);
    let mut fff = Company::new("fff", "Farstride", 30);
    companies.put_item(&mut ddd, PutOptions::default()).await.unwrap();
    companies.put_item(&mut eee, PutOptions::default()).await.unwrap();
    companies.put_item(&mut fff, PutOptions::default()).await.unwrap();
}
