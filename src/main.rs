use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use query_spec::config::SqlMappingConfig;
use query_spec::demo::Person;
use query_spec::lexer::tokenize;
use query_spec::sql_compiler::SqlCompiler;
use query_spec::{EntityFilterCriteria, Query};

fn sample_people() -> Vec<Person> {
    let mut john = Person::new("John", 25).with_company("Acme");
    john.score = Some(7);
    john.status = 1;
    john.is_active = true;

    let mut joan = Person::new("Joan", 15);
    joan.is_active = true;

    let mut mary = Person::new("Mary", 67).with_company("Initech");
    mary.score = Some(3);
    mary.status = 2;

    vec![john, joan, mary]
}

/// 从JSON配置文件加载SQL映射, 失败时使用默认配置
fn create_compiler_with_config() -> SqlCompiler {
    match SqlMappingConfig::from_json_file("query_mapping.json") {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载SQL映射: query_mapping.json");
            SqlCompiler::with_config(config)
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            SqlCompiler::new()
        }
    }
}

fn run_filter(line: &str, compiler: &SqlCompiler, people: &[Person]) -> Result<()> {
    let tokens = tokenize(line)?;
    let rendered: Vec<String> = tokens
        .iter()
        .map(|t| format!("{}({})", t.kind, t.value))
        .collect();
    println!("tokens    : {}", rendered.join(" "));

    let criteria = EntityFilterCriteria::<Person>::parse(line)?;
    println!("canonical : {}", criteria.canonical_text());

    let query = Query::<Person>::new().with_filter(criteria.clone());
    println!("json      : {}", query.encode());
    match compiler.compile(&query) {
        Ok(result) => println!("sql       : {}", result.sql),
        Err(e) => println!("sql       : {}", e),
    }

    for person in people {
        let name = person.name.as_deref().unwrap_or("-");
        match criteria.matches(person) {
            Ok(matched) => println!("  {:<8} {}", name, matched),
            Err(e) => println!("  {:<8} 错误: {}", name, e),
        }
    }
    Ok(())
}

fn run_query_document(line: &str, compiler: &SqlCompiler) -> Result<()> {
    match Query::<Person>::decode(line)? {
        Some(query) => println!("sql       : {}", compiler.compile(&query)?.sql),
        None => println!("(空查询)"),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("--- query_spec: Person 上的 Filter REPL ---");
    println!("可用成员: Name, Age, Nickname, Score, Balance, Initial, Status, IsActive");
    println!("          Company.Name, Company.Rating");
    println!("输入 Filter 文本或查询 JSON 文档, 输入 :q 退出\n");

    let compiler = create_compiler_with_config();
    let people = sample_people();
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == ":q" {
                    break;
                }
                editor.add_history_entry(line)?;

                let result = if line.starts_with('{') || line == "null" {
                    run_query_document(line, &compiler)
                } else {
                    run_filter(line, &compiler, &people)
                };
                if let Err(e) = result {
                    warn!(input = line, "rejected");
                    println!("错误: {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
