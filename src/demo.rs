//! REPL、测试和基准测试共用的 `Person`/`Company` 示例模型

use bigdecimal::BigDecimal;

use crate::schema::{Entity, EnumSchema, Field, Member, MemberType, Record, Schema};
use crate::value::Value;

pub static STATUS: EnumSchema = EnumSchema {
    name: "Status",
    variants: &[("Pending", 0), ("Active", 1), ("Retired", 2)],
};

pub static PERSON: Schema = Schema {
    name: "Person",
    members: &[
        Member { name: "Name", ty: MemberType::String },
        Member { name: "Age", ty: MemberType::Int },
        Member { name: "Nickname", ty: MemberType::String },
        Member { name: "Score", ty: MemberType::Optional(&MemberType::Int) },
        Member { name: "Balance", ty: MemberType::Decimal },
        Member { name: "Initial", ty: MemberType::Char },
        Member { name: "Status", ty: MemberType::Enum(&STATUS) },
        Member { name: "IsActive", ty: MemberType::Bool },
        Member { name: "Company", ty: MemberType::Record(Company::schema) },
    ],
};

pub static COMPANY: Schema = Schema {
    name: "Company",
    members: &[
        Member { name: "Name", ty: MemberType::String },
        Member { name: "Rating", ty: MemberType::Optional(&MemberType::Int) },
    ],
};

pub static PERSON_VIEW: Schema = Schema {
    name: "PersonView",
    members: &[
        Member { name: "Name", ty: MemberType::String },
        Member { name: "Years", ty: MemberType::Int },
        Member { name: "Employer", ty: MemberType::String },
    ],
};

#[derive(Debug, Clone, Default)]
pub struct Company {
    pub name: String,
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Person {
    pub name: Option<String>,
    pub age: i64,
    pub nickname: Option<String>,
    pub score: Option<i64>,
    pub balance: BigDecimal,
    pub initial: char,
    pub status: i64,
    pub is_active: bool,
    pub company: Option<Company>,
}

impl Person {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: Some(name.to_string()),
            age,
            initial: name.chars().next().unwrap_or(' '),
            ..Default::default()
        }
    }

    pub fn with_company(mut self, name: &str) -> Self {
        self.company = Some(Company {
            name: name.to_string(),
            rating: None,
        });
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PersonView;

impl Record for Company {
    fn field(&self, name: &str) -> Option<Field<'_>> {
        match name {
            "Name" => Some(Field::Value(Value::from(self.name.as_str()))),
            "Rating" => Some(Field::Value(Value::from(self.rating))),
            _ => None,
        }
    }
}

impl Entity for Company {
    fn schema() -> &'static Schema {
        &COMPANY
    }
}

impl Record for Person {
    fn field(&self, name: &str) -> Option<Field<'_>> {
        let value = match name {
            "Name" => Value::from(self.name.clone()),
            "Age" => Value::Int(self.age),
            "Nickname" => Value::from(self.nickname.clone()),
            "Score" => Value::from(self.score),
            "Balance" => Value::Decimal(self.balance.clone()),
            "Initial" => Value::Char(self.initial),
            "Status" => Value::Enum(self.status),
            "IsActive" => Value::Bool(self.is_active),
            "Company" => {
                return Some(Field::Record(
                    self.company.as_ref().map(|c| c as &dyn Record),
                ))
            }
            _ => return None,
        };
        Some(Field::Value(value))
    }
}

impl Entity for Person {
    fn schema() -> &'static Schema {
        &PERSON
    }
}

impl Record for PersonView {
    fn field(&self, _name: &str) -> Option<Field<'_>> {
        None
    }
}

impl Entity for PersonView {
    fn schema() -> &'static Schema {
        &PERSON_VIEW
    }
}
