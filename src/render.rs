use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::gitlab_types::{BuildStatus, Notification, WorkItem};
use crate::models::Dashboard;

/// Values shown in the page header and used for the reload timer.
pub struct PageContext<'a> {
    pub username: &'a str,
    pub host: &'a str,
    pub refresh_seconds: u64,
}

const STYLE: &str = r#"
:root{--bg:#f6f7fb;--panel:#ffffff;--panel-2:#f2f4f8;--text:#0b1220;--muted:#566173;--brand:#0b63ff;--border:#dbe1ea}
@media (prefers-color-scheme: dark){
  :root{--bg:#0b1020;--panel:#111731;--panel-2:#0e142a;--text:#e8ecf1;--muted:#9aa6b2;--brand:#6aa3ff;--border:#223056}
  body{background:radial-gradient(1200px 800px at 100% -20%, #1a2447 0%, rgba(26,36,71,0) 60%), var(--bg)}
  .card{box-shadow:0 6px 18px rgba(0,0,0,.25)}
  .card:hover{transform:translateY(-2px);box-shadow:0 10px 24px rgba(0,0,0,.35);border-color:#2c3e70}
}
*{box-sizing:border-box}
body{margin:0;padding:24px;min-height:100vh;font:15px/1.5 system-ui, Segoe UI, Roboto, Helvetica, Arial;color:var(--text);background:var(--bg)}
.container{max-width:1100px;margin:0 auto}
.header{display:flex;align-items:center;justify-content:space-between;gap:16px;margin-bottom:18px}
.brand{display:flex;align-items:center;gap:12px}
.brand .logo{width:34px;height:34px;border-radius:8px;background:linear-gradient(135deg, var(--brand), #b38cff)}
.brand h1{font-size:20px;margin:0}
.topline{color:var(--muted);font-size:12px;margin-bottom:18px}
.section{margin-top:26px}
.section h2{font-size:16px;color:var(--muted);margin:0 0 10px 0}
.grid{display:grid;grid-template-columns:repeat(auto-fill, minmax(320px,1fr));gap:12px}
.card{background:linear-gradient(180deg, var(--panel), var(--panel-2));border:1px solid var(--border);border-radius:14px;padding:14px;transition:transform .08s ease, box-shadow .2s ease, border-color .2s ease}
.card .title{font-weight:600;margin-bottom:6px}
.card .title a{color:var(--text);text-decoration:none}
.card .title a:hover{color:var(--brand)}
.meta{display:flex;flex-wrap:wrap;gap:8px;align-items:center;color:var(--muted);font-size:12px}
.badge{display:inline-block;padding:2px 8px;border-radius:999px;border:1px solid var(--border);background:var(--panel-2);color:var(--text);font-size:11px}
.small{color:var(--muted);font-size:12px}
.empty{color:var(--muted);font-size:13px;padding:10px;border:1px dashed var(--border);border-radius:10px;background:var(--panel-2)}
hr.sep{border:none;border-top:1px solid var(--border);margin:10px 0}
a{color:var(--brand);text-decoration:none}
a:hover{text-decoration:underline}
footer{margin-top:28px;color:var(--muted);font-size:12px}
.layout{display:grid;grid-template-columns:280px 1fr;gap:16px}
.sidebar{background:linear-gradient(180deg, var(--panel), var(--panel-2));border:1px solid var(--border);border-radius:14px;padding:14px;height:fit-content;position:sticky;top:16px}
.sidebar h2{font-size:15px;margin:0 0 8px 0;color:var(--muted)}
.list{list-style:none;margin:0;padding:0;display:flex;flex-direction:column;gap:8px}
.list li a{color:var(--text);text-decoration:none}
.list li a:hover{color:var(--brand)}
.content{min-width:0}
@media (max-width: 860px){.layout{grid-template-columns:1fr}.sidebar{position:static}}
.pipe{display:inline-flex;align-items:center;gap:6px}
.dot{display:inline-block;width:10px;height:10px;border-radius:50%;background:#3b82f6;box-shadow:0 0 0 1px var(--border)}
.dot[data-status="success"]{background:#22c55e}
.dot[data-status="failed"]{background:#ef4444}
"#;

const SCRIPT: &str = r#"
function timeago(dt){
  const rtf = new Intl.RelativeTimeFormat(navigator.language || 'en', {numeric:'auto'});
  const diff = (new Date(dt) - new Date()) / 1000;
  const abs = Math.abs(diff);
  const units = [['year',31536000],['month',2592000],['week',604800],['day',86400],['hour',3600],['minute',60],['second',1]];
  for (const [unit, sec] of units){
    if (abs >= sec || unit === 'second'){ return rtf.format(Math.round(diff / sec), unit); }
  }
}
function refreshTimes(){
  document.querySelectorAll('time.timeago').forEach(t=>{
    const dt = t.getAttribute('datetime');
    if (dt) t.textContent = timeago(dt);
  });
}
refreshTimes(); setInterval(refreshTimes, 30000);
"#;

/// Escape text for use in element content and quoted attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn pipeline_dot(out: &mut String, pipeline: &Option<BuildStatus>) {
    if let Some(p) = pipeline {
        let _ = write!(
            out,
            r#"<a class="pipe" target="_blank" rel="noopener noreferrer" href="{url}" title="pipeline: {status}"><span class="dot" data-status="{status}"></span></a>"#,
            url = escape(&p.web_url),
            status = escape(&p.status),
        );
    }
}

fn team_list(out: &mut String, items: &[WorkItem]) {
    if items.is_empty() {
        out.push_str(r#"<div class="empty">No team merge requests.</div>"#);
        return;
    }
    out.push_str(r#"<ul class="list">"#);
    for item in items {
        let _ = write!(
            out,
            r#"<li><a target="_blank" rel="noopener noreferrer" href="{}">{}</a><div class="small">{} • {}</div>"#,
            escape(&item.web_url),
            escape(&item.title),
            escape(&item.reference),
            escape(&item.author),
        );
        pipeline_dot(out, &item.head_pipeline);
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

fn merge_request_cards(out: &mut String, items: &[WorkItem]) {
    if items.is_empty() {
        out.push_str(r#"<div class="empty">No open merge requests.</div>"#);
        return;
    }
    out.push_str(r#"<div class="grid">"#);
    for item in items {
        let _ = write!(
            out,
            r#"<div class="card"><div class="title"><a target="_blank" rel="noopener noreferrer" href="{}">{}</a></div><div class="meta"><span class="badge">{}</span><span>by {}</span>"#,
            escape(&item.web_url),
            escape(&item.title),
            escape(&item.reference),
            escape(&item.author),
        );
        pipeline_dot(out, &item.head_pipeline);
        let _ = write!(
            out,
            r#"<span>•</span><span>updated</span><time class="timeago" datetime="{}"></time></div></div>"#,
            timestamp(&item.updated_at),
        );
    }
    out.push_str("</div>");
}

fn todo_cards(out: &mut String, todos: &[Notification]) {
    if todos.is_empty() {
        out.push_str(r#"<div class="empty">No pending todos.</div>"#);
        return;
    }
    out.push_str(r#"<div class="grid">"#);
    for todo in todos {
        let _ = write!(
            out,
            r#"<div class="card"><div class="title"><a target="_blank" rel="noopener noreferrer" href="{}">{}</a></div><div class="meta"><span class="badge">{}</span><span class="badge">{}</span><span class="badge">{}</span><span>• created</span><time class="timeago" datetime="{}"></time></div></div>"#,
            escape(&todo.target.web_url),
            escape(&todo.target.title),
            escape(&todo.project_name),
            escape(&todo.target_type),
            escape(&todo.action_name),
            timestamp(&todo.created_at),
        );
    }
    out.push_str("</div>");
}

/// Render the full dashboard document.
pub fn render_page(dashboard: &Dashboard, ctx: &PageContext<'_>) -> String {
    let mut out = String::with_capacity(16 * 1024);
    let user = escape(ctx.username);

    let _ = write!(
        out,
        r#"<!doctype html>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="color-scheme" content="light dark">
<title>GitLab dashboard – {user}</title>
<style>{STYLE}</style>
<div class="container">
<div class="header"><div class="brand"><div class="logo"></div><h1>GitLab dashboard</h1></div><div class="small">Signed in as <strong>{user}</strong></div></div>
<div class="topline">Host: {host} • Auto-refresh every {refresh}s</div>
<div class="layout">
<aside class="sidebar"><h2>Team MRs</h2>"#,
        host = escape(ctx.host),
        refresh = ctx.refresh_seconds,
    );
    team_list(&mut out, &dashboard.team_items);
    out.push_str(
        r#"<hr class="sep"/><div class="small">Source: authors or assignees from <code>TEAMMATE_USERNAMES</code></div></aside>
<main class="content"><div class="section"><h2>Open Merge Requests <span class="small">(assignee + reviewer)</span></h2>"#,
    );
    merge_request_cards(&mut out, &dashboard.my_items);
    out.push_str(r#"</div><div class="section"><h2>Todos</h2>"#);
    todo_cards(&mut out, &dashboard.notifications);
    let _ = write!(
        out,
        r#"</div></main></div>
<footer>Tip: links open in a new tab.</footer>
</div>
<script>{SCRIPT}setTimeout(()=>location.reload(), {reload_ms});</script>
"#,
        reload_ms = ctx.refresh_seconds.saturating_mul(1000),
    );

    out
}
