//! HTML rendering.
//!
//! Pages are plain `String`s assembled from small helpers. Every value that
//! comes from the server or the user passes through [`esc`].

use sim_api::SimulationTemplate;
use sim_core::{
    compare_all, format_number, Comparison, TableName, Viewable, NOT_FOUND_COMMODITY,
};
use sim_link::LinkedStage;
use sim_runtime::{Simulation, User};
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;margin:1.5em}\
table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #bbb;padding:2px 8px;text-align:right}\
th{background:#eee}td.text{text-align:left}\
td.changed{background:#ffe08a;font-weight:bold}\
nav a{margin-right:.8em}.notice{color:#a00;font-weight:bold}\
.status{margin:.5em 0 1em 0}.action{font-weight:bold;text-transform:uppercase}";

/// Escape text for HTML element and attribute content.
pub fn esc(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

/// Context shown above every page of a logged-in user.
pub struct Header<'a> {
    pub username: &'a str,
    pub simulation: Option<&'a Simulation>,
    pub notice: Option<&'a str>,
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title><style>{STYLE}</style></head>\n<body>\n{body}\n</body></html>\n",
        esc(title)
    )
}

fn notice(message: Option<&str>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!("<p class=\"notice\">{}</p>\n", esc(m)),
        _ => String::new(),
    }
}

/// A full page for a logged-in user.
pub fn layout(title: &str, header: &Header<'_>, body: &str) -> String {
    let mut out = String::new();
    out.push_str(
        "<nav><a href=\"/user/dashboard\">Dashboard</a><a href=\"/index\">Index</a>\
<a href=\"/commodities\">Commodities</a><a href=\"/industries\">Industries</a>\
<a href=\"/classes\">Classes</a><a href=\"/industry_stocks\">Industry stocks</a>\
<a href=\"/class_stocks\">Class stocks</a><a href=\"/download\">Download</a>\
<a href=\"/user/data\">Data</a><a href=\"/about\">About</a><a href=\"/auth/logout\">Log out</a></nav>\n",
    );
    let _ = write!(out, "<p>Logged in as <b>{}</b></p>\n", esc(header.username));
    if let Some(sim) = header.simulation {
        let m = sim.manager();
        let next = sim.state().action();
        let _ = write!(
            out,
            "<div class=\"status\">Simulation {} | state <b>{}</b> | viewing step {} of {} (compared with step {}) \
<a href=\"/user/back\">&laquo; back</a> <a href=\"/user/forward\">forward &raquo;</a> \
<a class=\"action\" href=\"/action/{}\">{}</a></div>\n",
            sim.id(),
            sim.state(),
            m.viewed(),
            m.current(),
            m.compared(),
            next,
            next
        );
    }
    out.push_str(&notice(header.notice));
    let _ = write!(out, "<h1>{}</h1>\n{body}", esc(title));
    document(title, &out)
}

pub fn login(message: Option<&str>) -> String {
    document(
        "Log in",
        &format!(
            "<h1>Log in</h1>\n{}<form method=\"post\" action=\"/auth/login\">\
<label>Username <input name=\"username\"></label> \
<label>Password <input name=\"password\" type=\"password\"></label> \
<button type=\"submit\">Log in</button></form>\n\
<p><a href=\"/auth/register\">Register</a></p>",
            notice(message)
        ),
    )
}

pub fn register(message: Option<&str>) -> String {
    document(
        "Register",
        &format!(
            "<h1>Register</h1>\n{}<form method=\"post\" action=\"/auth/register\">\
<label>Username <input name=\"username\"></label> \
<label>Password <input name=\"password\" type=\"password\"></label> \
<button type=\"submit\">Register</button></form>\n\
<p><a href=\"/auth/login\">Log in</a></p>",
            notice(message)
        ),
    )
}

/// Generic error page, used when there is no page to fall back to.
pub fn error_page(message: &str) -> String {
    document(
        "Error",
        &format!(
            "<h1>Something went wrong</h1>\n<p class=\"notice\">{}</p>\n<p><a href=\"/user/dashboard\">Back to the dashboard</a></p>",
            esc(message)
        ),
    )
}

pub fn not_found(path: &str) -> String {
    document(
        "Not found",
        &format!(
            "<h1>Not found</h1>\n<p>There is no page at <code>{}</code>.</p>\n<p><a href=\"/index\">Index</a></p>",
            esc(path)
        ),
    )
}

pub fn welcome(username: &str) -> String {
    format!(
        "<p>Welcome, {}. Pick a simulation from the <a href=\"/user/dashboard\">dashboard</a> \
or clone a new one from a template.</p>",
        esc(username)
    )
}

pub fn about() -> String {
    format!(
        "<p>Front end for the circuit-of-capital simulation.</p>\n\
<table><tr><th>version</th><td class=\"text\">{}</td></tr>\
<tr><th>commit</th><td class=\"text\">{}</td></tr>\
<tr><th>built</th><td class=\"text\">{}</td></tr></table>",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHA"),
        esc(env!("BUILD_DATE"))
    )
}

pub fn dashboard(user: &User, templates: &[SimulationTemplate]) -> String {
    let mut out = String::from("<h2>Your simulations</h2>\n");
    if user.simulations().next().is_none() {
        out.push_str("<p>You have no simulations yet. Create one from a template below.</p>\n");
    } else {
        out.push_str(
            "<table><tr><th>id</th><th>template</th><th>state</th><th>steps</th><th></th></tr>\n",
        );
        for sim in user.simulations() {
            let id = sim.id();
            let current = if user.current_simulation_id() == Some(id) {
                " (current)"
            } else {
                ""
            };
            let _ = write!(
                out,
                "<tr><td>{id}{current}</td><td>{}</td><td class=\"text\">{}</td><td>{}</td>\
<td class=\"text\"><a href=\"/user/switch/{id}\">switch</a> <a href=\"/user/restart/{id}\">restart</a> \
<a href=\"/user/delete/{id}\">delete</a></td></tr>\n",
                sim.template_id(),
                sim.state(),
                sim.history_len()
            );
        }
        out.push_str("</table>\n");
    }

    out.push_str("<h2>Templates</h2>\n");
    if templates.is_empty() {
        out.push_str("<p>No templates are available.</p>\n");
        return out;
    }
    out.push_str(
        "<table><tr><th>id</th><th>name</th><th>periods per year</th><th>population growth</th>\
<th>investment ratio</th><th>currency</th><th></th></tr>\n",
    );
    for t in templates {
        let _ = write!(
            out,
            "<tr><td>{}</td><td class=\"text\">{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"text\">{}</td>\
<td class=\"text\"><a href=\"/user/create/{}\">create</a></td></tr>\n",
            t.id,
            esc(&t.name),
            format_number(t.periods_per_year),
            format_number(t.population_growth_rate),
            format_number(t.investment_ratio),
            esc(&t.currency_symbol),
            t.id
        );
    }
    out.push_str("</table>\n");
    out
}

fn heading(field: &str) -> String {
    esc(&field.replace('_', " "))
}

/// A table of records. Each row has some leading cells (already HTML)
/// followed by one cell per viewable field; changed values are highlighted.
fn data_table<'a, T, I>(lead_headers: &[&str], rows: I) -> String
where
    T: Viewable + 'a,
    I: IntoIterator<Item = (Vec<String>, Comparison<'a, T>)>,
{
    let mut out = String::from("<table><tr>");
    for h in lead_headers {
        let _ = write!(out, "<th>{}</th>", esc(h));
    }
    for f in T::FIELDS {
        let _ = write!(out, "<th>{}</th>", heading(f));
    }
    out.push_str("</tr>\n");
    let mut count = 0;
    for (lead, cmp) in rows {
        count += 1;
        out.push_str("<tr>");
        for cell in lead {
            let _ = write!(out, "<td class=\"text\">{cell}</td>");
        }
        for cell in cmp.cells() {
            let numeric = cell.value.parse::<f64>().is_ok();
            let class = match (cell.changed, numeric) {
                (true, _) => " class=\"changed\"",
                (false, true) => "",
                (false, false) => " class=\"text\"",
            };
            let _ = write!(out, "<td{class}>{}</td>", esc(&cell.value));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
    if count == 0 {
        return "<p>No data for this step.</p>\n".to_string();
    }
    out
}

fn link(kind: &str, id: i64, text: &str) -> String {
    format!("<a href=\"/{kind}/{id}\">{}</a>", esc(text))
}

fn commodities_table(viewed: &LinkedStage, compared: &LinkedStage) -> String {
    let rows = compare_all(&viewed.stage().commodities, &compared.stage().commodities)
        .into_iter()
        .map(|c| (vec![link("commodity", c.viewed.id, &c.viewed.id.to_string())], c));
    data_table(&["id"], rows)
}

fn industries_table(viewed: &LinkedStage, compared: &LinkedStage) -> String {
    let baseline = &compared.stage().industries;
    let rows = viewed.industries().map(|node| {
        let record = node.record();
        let product = node
            .commodity()
            .map(|c| link("commodity", c.id, &c.name))
            .unwrap_or_else(|| esc(&NOT_FOUND_COMMODITY.name));
        (
            vec![link("industry", record.id, &record.id.to_string()), product],
            Comparison::find(record, baseline),
        )
    });
    data_table(&["id", "product"], rows)
}

fn classes_table(viewed: &LinkedStage, compared: &LinkedStage) -> String {
    let baseline = &compared.stage().classes;
    let rows = viewed.classes().map(|node| {
        let record = node.record();
        (
            vec![link("class", record.id, &record.id.to_string())],
            Comparison::find(record, baseline),
        )
    });
    data_table(&["id"], rows)
}

fn industry_stocks_table(viewed: &LinkedStage, compared: &LinkedStage) -> String {
    let baseline = &compared.stage().industry_stocks;
    let rows = viewed.industry_stocks().map(|node| {
        let owner = node
            .industry()
            .map(|i| link("industry", i.id, &i.name))
            .unwrap_or_else(|| esc(node.industry_name()));
        (
            vec![owner, esc(node.commodity_name())],
            Comparison::find(node.record(), baseline),
        )
    });
    data_table(&["industry", "commodity"], rows)
}

fn class_stocks_table(viewed: &LinkedStage, compared: &LinkedStage) -> String {
    let baseline = &compared.stage().class_stocks;
    let rows = viewed.class_stocks().map(|node| {
        let owner = node
            .class()
            .map(|c| link("class", c.id, &c.name))
            .unwrap_or_else(|| esc(node.class_name()));
        (
            vec![owner, esc(node.commodity_name())],
            Comparison::find(node.record(), baseline),
        )
    });
    data_table(&["class", "commodity"], rows)
}

fn failed_note(viewed: &LinkedStage, table: TableName) -> String {
    if viewed.stage().failed.contains(&table) {
        format!(
            "<p class=\"notice\">The {} of this step could not be fetched.</p>\n",
            table.label()
        )
    } else {
        String::new()
    }
}

/// One table of the viewed step, compared with the compared step.
pub fn table(sim: &Simulation, table: TableName) -> String {
    let (viewed, compared) = (sim.viewed_stage(), sim.compared_stage());
    let body = match table {
        TableName::Commodities => commodities_table(viewed, compared),
        TableName::Industries => industries_table(viewed, compared),
        TableName::Classes => classes_table(viewed, compared),
        TableName::IndustryStocks => industry_stocks_table(viewed, compared),
        TableName::ClassStocks => class_stocks_table(viewed, compared),
    };
    format!("{}{body}", failed_note(viewed, table))
}

/// Every table of the viewed step.
pub fn index(sim: &Simulation) -> String {
    let mut out = String::new();
    let issues = &sim.viewed_stage().report().issues;
    if !issues.is_empty() {
        let _ = write!(
            out,
            "<p class=\"notice\">{} data problem(s) were found in this step; see the log.</p>\n",
            issues.len()
        );
    }
    for t in TableName::ALL {
        let _ = write!(out, "<h2>{}</h2>\n{}", esc(&capitalise(t.label())), table(sim, t));
    }
    out
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn missing(kind: &str, id: i64) -> String {
    format!("<p class=\"notice\">There is no {kind} with id {id} in this step.</p>\n")
}

pub fn commodity_detail(sim: &Simulation, id: i64) -> String {
    let (viewed, compared) = (sim.viewed_stage(), sim.compared_stage());
    let Some(commodity) = viewed.commodity(id) else {
        let placeholder = viewed.commodity_or_placeholder(id);
        return format!(
            "{}{}",
            missing("commodity", id),
            data_table(&[], [(vec![], Comparison::find(placeholder, &[]))])
        );
    };
    let mut out = data_table(
        &[],
        [(vec![], Comparison::find(commodity, &compared.stage().commodities))],
    );
    out.push_str("<h2>Held by industries</h2>\n");
    let baseline = &compared.stage().industry_stocks;
    out.push_str(&data_table(
        &["industry"],
        viewed
            .industry_stocks()
            .filter(|s| s.commodity().map(|c| c.id) == Some(id))
            .map(|s| {
                (
                    vec![esc(s.industry_name())],
                    Comparison::find(s.record(), baseline),
                )
            }),
    ));
    out.push_str("<h2>Held by classes</h2>\n");
    let baseline = &compared.stage().class_stocks;
    out.push_str(&data_table(
        &["class"],
        viewed
            .class_stocks()
            .filter(|s| s.commodity().map(|c| c.id) == Some(id))
            .map(|s| {
                (
                    vec![esc(s.class_name())],
                    Comparison::find(s.record(), baseline),
                )
            }),
    ));
    out
}

pub fn industry_detail(sim: &Simulation, id: i64) -> String {
    let (viewed, compared) = (sim.viewed_stage(), sim.compared_stage());
    let Some(industry) = viewed.industry(id) else {
        let placeholder = viewed.industry_or_placeholder(id);
        return format!(
            "{}{}",
            missing("industry", id),
            data_table(&[], [(vec![], Comparison::find(placeholder, &[]))])
        );
    };
    let mut out = data_table(
        &[],
        [(
            vec![],
            Comparison::find(industry.record(), &compared.stage().industries),
        )],
    );
    let baseline = &compared.stage().industry_stocks;
    let mut stocks = vec![
        ("money", industry.money_or_placeholder()),
        ("sales", industry.sales_or_placeholder()),
        ("variable capital", industry.variable_or_placeholder()),
    ];
    for constant in industry.constant() {
        stocks.push(("constant capital", constant.record()));
    }
    out.push_str("<h2>Stocks</h2>\n");
    out.push_str(&data_table(
        &["role", "commodity"],
        stocks.into_iter().map(|(role, stock)| {
            let commodity = viewed.commodity_or_placeholder(stock.commodity_id);
            (
                vec![role.to_string(), esc(&commodity.name)],
                Comparison::find(stock, baseline),
            )
        }),
    ));
    out
}

pub fn class_detail(sim: &Simulation, id: i64) -> String {
    let (viewed, compared) = (sim.viewed_stage(), sim.compared_stage());
    let Some(class) = viewed.class(id) else {
        let placeholder = viewed.class_or_placeholder(id);
        return format!(
            "{}{}",
            missing("class", id),
            data_table(&[], [(vec![], Comparison::find(placeholder, &[]))])
        );
    };
    let mut out = data_table(
        &[],
        [(
            vec![],
            Comparison::find(class.record(), &compared.stage().classes),
        )],
    );
    let baseline = &compared.stage().class_stocks;
    let mut stocks = vec![
        ("money", class.money_or_placeholder()),
        ("sales", class.sales_or_placeholder()),
    ];
    for consumption in class.consumption() {
        stocks.push(("consumption", consumption.record()));
    }
    out.push_str("<h2>Stocks</h2>\n");
    out.push_str(&data_table(
        &["role", "commodity"],
        stocks.into_iter().map(|(role, stock)| {
            let commodity = viewed.commodity_or_placeholder(stock.commodity_id);
            (
                vec![role.to_string(), esc(&commodity.name)],
                Comparison::find(stock, baseline),
            )
        }),
    ));
    out
}
