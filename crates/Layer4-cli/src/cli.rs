//! 서브커맨드 출력 (테이블 / JSON)

use serde::Serialize;
use smartx_core::{MenuItem, PluginCatalog, SmartApp};

/// 출력 형식
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// JSON 모드면 `value`를, 아니면 `table`이 만든 문자열을 출력
    fn emit<T: Serialize>(&self, value: &T, table: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", table());
        }
        Ok(())
    }
}

fn header(columns: &str) -> String {
    format!("{}\n{}\n", columns, "-".repeat(columns.len().max(40)))
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub async fn summary(app: &SmartApp, output: &Output) -> anyhow::Result<()> {
    let value = smartx_core::summary(app).await;
    let stats = app.registry().statistics().await;
    output.emit(&value, || {
        let config = app.config();
        format!(
            "{} (tenant: {})\nstorage: {}\nplugins: {} installed, {} enabled\n\nRun 'smartx --help' for commands.\n",
            config.app_name,
            config.tenant.as_deref().unwrap_or("-"),
            app.storage().backend(),
            stats.total,
            stats.enabled,
        )
    })
}

pub async fn catalog(app: &SmartApp, catalog: &PluginCatalog, output: &Output) -> anyhow::Result<()> {
    let descriptors = catalog.descriptors();
    let mut status = Vec::with_capacity(descriptors.len());
    for d in &descriptors {
        status.push(app.registry().status(&d.id).await);
    }

    output.emit(&descriptors, || {
        let mut out = header(&format!(
            "{:<22} {:<8} {:<14} {:<10} {}",
            "ID", "VERSION", "DOMAIN", "STATUS", "DEPENDS ON"
        ));
        for (d, s) in descriptors.iter().zip(&status) {
            let deps: Vec<_> = d.dependencies.iter().map(|dep| dep.id.as_str()).collect();
            out.push_str(&format!(
                "{:<22} {:<8} {:<14} {:<10} {}\n",
                d.id,
                d.version,
                d.domain,
                s.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                if deps.is_empty() { "-".to_string() } else { deps.join(", ") },
            ));
        }
        out
    })
}

pub async fn list(app: &SmartApp, output: &Output) -> anyhow::Result<()> {
    let plugins = app.registry().list().await;
    output.emit(&plugins, || {
        if plugins.is_empty() {
            return "No plugins installed.\n".to_string();
        }
        let mut out = header(&format!(
            "{:<22} {:<8} {:<14} {:<10} {}",
            "ID", "VERSION", "DOMAIN", "STATUS", "INSTALLED"
        ));
        for p in &plugins {
            out.push_str(&format!(
                "{:<22} {:<8} {:<14} {:<10} {}\n",
                p.id,
                p.version,
                p.domain,
                p.status,
                p.installed_at.format("%Y-%m-%d %H:%M:%S"),
            ));
            if let Some(error) = &p.error {
                out.push_str(&format!("  error: {}\n", error));
            }
        }
        out
    })
}

pub async fn stats(app: &SmartApp, output: &Output) -> anyhow::Result<()> {
    let stats = app.registry().statistics().await;
    output.emit(&stats, || {
        let mut out = format!(
            "total:     {}\ninstalled: {}\nenabled:   {}\ndisabled:  {}\nerror:     {}\n",
            stats.total, stats.installed, stats.enabled, stats.disabled, stats.error
        );
        if !stats.by_domain.is_empty() {
            out.push_str("\nby domain:\n");
            for (domain, count) in &stats.by_domain {
                out.push_str(&format!("  {:<14} {}\n", domain, count));
            }
        }
        out
    })
}

pub async fn health(app: &SmartApp, id: Option<&str>, output: &Output) -> anyhow::Result<()> {
    let reports = app.health_check(id).await;
    output.emit(&reports, || {
        if reports.is_empty() {
            return "No enabled plugins to check.\n".to_string();
        }
        let mut out = header(&format!("{:<22} {:<10} {}", "ID", "STATUS", "MESSAGE"));
        for (id, report) in &reports {
            out.push_str(&format!(
                "{:<22} {:<10} {}\n",
                id,
                report.status,
                or_dash(report.message.as_deref())
            ));
        }
        out
    })
}

fn render_menu(out: &mut String, item: &MenuItem, depth: usize) {
    out.push_str(&format!(
        "{:indent$}{:<5} {:<20} {}\n",
        "",
        item.order.map(|o| o.to_string()).unwrap_or_else(|| "-".into()),
        item.label,
        item.path,
        indent = depth * 2
    ));
    for child in &item.children {
        render_menu(out, child, depth + 1);
    }
}

pub async fn menus(app: &SmartApp, output: &Output) -> anyhow::Result<()> {
    let menus = app.registry().menus().await;
    output.emit(&menus, || {
        let mut out = header(&format!("{:<5} {:<20} {}", "ORDER", "LABEL", "PATH"));
        for item in &menus {
            render_menu(&mut out, item, 0);
        }
        out
    })
}

pub async fn widgets(app: &SmartApp, output: &Output) -> anyhow::Result<()> {
    let widgets = app.registry().widgets().await;
    output.emit(&widgets, || {
        let mut out = header(&format!("{:<28} {:<12} {}", "ID", "KIND", "TITLE"));
        for w in &widgets {
            out.push_str(&format!("{:<28} {:<12} {}\n", w.id, format!("{:?}", w.kind), w.title));
        }
        out
    })
}

pub async fn components(app: &SmartApp, output: &Output) -> anyhow::Result<()> {
    let components = app.registry().components().await;
    output.emit(&components, || {
        let mut out = header(&format!("{:<32} {:<10} {}", "KEY", "KIND", "DESCRIPTION"));
        for (key, c) in &components {
            out.push_str(&format!(
                "{:<32} {:<10} {}\n",
                key,
                format!("{:?}", c.kind),
                or_dash(c.description.as_deref())
            ));
        }
        out
    })
}

pub async fn routes(app: &SmartApp, output: &Output) -> anyhow::Result<()> {
    let routes = app.registry().routes().await;
    output.emit(&routes, || {
        let mut out = header(&format!("{:<32} {:<24} {}", "PATH", "COMPONENT", "TITLE"));
        for r in &routes {
            out.push_str(&format!(
                "{:<32} {:<24} {}\n",
                r.path,
                r.component,
                or_dash(r.title.as_deref())
            ));
        }
        out
    })
}

pub async fn events(app: &SmartApp, limit: usize, output: &Output) -> anyhow::Result<()> {
    let records = app.lifecycle_log(Some(limit)).await?;
    output.emit(&records, || {
        if records.is_empty() {
            return "No lifecycle events recorded.\n".to_string();
        }
        let mut out = header(&format!("{:<20} {:<22} {:<22} {}", "TIME", "EVENT", "PLUGIN", "ERROR"));
        for r in &records {
            let error = match (&r.error_code, &r.error_message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (Some(code), None) => code.clone(),
                _ => "-".to_string(),
            };
            out.push_str(&format!(
                "{:<20} {:<22} {:<22} {}\n",
                r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                r.event,
                r.plugin_id,
                error
            ));
        }
        out
    })
}
