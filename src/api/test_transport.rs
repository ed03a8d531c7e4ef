//! Implements the `Transport` trait with an in-memory copy of the site for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without talking to the real site.

use crate::api::{Page, Params, Transport, TransportResult, APP_URL};
use crate::error::TransportError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

/// What the fake site answers for one route.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reply {
    /// The final URL of the response. `None` means the request URL, i.e. no redirect happened.
    url: Option<String>,
    status: u16,
    body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            url: None,
            status: 200,
            body: body.into(),
        }
    }

    /// A response that was reached by following redirects to `url`.
    pub fn redirected(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            url: None,
            status,
            body: String::new(),
        }
    }
}

/// A request received by the fake site.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub url: Url,
    pub headers: Params,
    /// The form body of a POST or the query parameters of a PUT.
    pub params: Params,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by method and path. A path ending in `/*` matches any single trailing segment. When a
    /// queue holds more than one reply they are served in order, and the last one repeats.
    routes: HashMap<(&'static str, String), VecDeque<Reply>>,
    requests: Vec<Recorded>,
    latency: Option<Duration>,
}

/// An implementation of the `Transport` trait that does not use the network. Clones share the same
/// site, so a test can keep a handle to inspect requests after giving one to a `Session`.
#[derive(Debug, Clone)]
pub struct TestTransport {
    state: Arc<Mutex<State>>,
}

impl TestTransport {
    /// A site with no routes; every request gets a 404.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Serves `reply` for every `method` request to `path`, replacing what was there.
    pub fn route(&self, method: &'static str, path: &str, reply: Reply) {
        self.route_sequence(method, path, vec![reply]);
    }

    /// Serves `replies` in order for `method` requests to `path`. The last reply repeats.
    pub fn route_sequence(&self, method: &'static str, path: &str, replies: Vec<Reply>) {
        self.lock()
            .routes
            .insert((method, path.to_string()), replies.into());
    }

    /// Makes every request take `latency` to complete.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Makes the credential check answer with a one-time passcode challenge.
    pub fn require_otp(&self) {
        self.require_otp_at(OTP_URL);
    }

    /// Like `require_otp`, but the challenge lands on `url`.
    pub fn require_otp_at(&self, url: &str) {
        self.route("POST", "/sign_in", Reply::redirected(url, OTP_PAGE));
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<Recorded> {
        self.lock().requests.clone()
    }

    /// How many `method` requests were made to exactly `path`.
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }

    /// The most recent `method` request to exactly `path`.
    pub fn last(&self, method: &str, path: &str) -> Option<Recorded> {
        self.lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.method == method && r.url.path() == path)
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn respond(
        &self,
        method: &'static str,
        url: &Url,
        headers: &Params,
        params: &Params,
    ) -> TransportResult<Page> {
        let (reply, latency) = {
            let mut state = self.lock();
            state.requests.push(Recorded {
                method,
                url: url.clone(),
                headers: headers.clone(),
                params: params.clone(),
            });
            let latency = state.latency;
            (next_reply(&mut state, method, url.path()), latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let reply = reply.unwrap_or_else(|| Reply::status(404));
        if !(200..300).contains(&reply.status) {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: reply.status,
            });
        }
        let final_url = match reply.url {
            Some(s) => Url::parse(&s).map_err(|e| TransportError::Request {
                url: url.to_string(),
                source: Box::new(e),
            })?,
            None => url.clone(),
        };
        Ok(Page {
            url: final_url,
            body: reply.body,
        })
    }
}

fn next_reply(state: &mut State, method: &'static str, path: &str) -> Option<Reply> {
    let wildcard = path
        .rsplit_once('/')
        .map(|(parent, _)| format!("{parent}/*"));
    let key = if state.routes.contains_key(&(method, path.to_string())) {
        (method, path.to_string())
    } else {
        (method, wildcard?)
    };
    let queue = state.routes.get_mut(&key)?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait::async_trait]
impl Transport for TestTransport {
    async fn get(&self, url: &Url, headers: &Params) -> TransportResult<Page> {
        self.respond("GET", url, headers, &Params::new()).await
    }

    async fn post(&self, url: &Url, headers: &Params, form: &Params) -> TransportResult<Page> {
        self.respond("POST", url, headers, form).await
    }

    async fn put(&self, url: &Url, headers: &Params, params: &Params) -> TransportResult<()> {
        self.respond("PUT", url, headers, params).await.map(|_| ())
    }

    async fn delete(&self, url: &Url, headers: &Params) -> TransportResult<()> {
        self.respond("DELETE", url, headers, &Params::new())
            .await
            .map(|_| ())
    }
}

impl Default for TestTransport {
    /// Loads the seed site from this module.
    fn default() -> Self {
        let site = Self::new();
        site.route("GET", "/sign_in/", Reply::redirected(SIGN_IN_URL, SIGN_IN_PAGE));
        site.route("POST", "/sign_in", Reply::redirected(APP_URL, DASHBOARD_PAGE));
        site.route("POST", "/email_otp", Reply::redirected(APP_URL, DASHBOARD_PAGE));
        site.route("GET", "/", Reply::ok(DASHBOARD_PAGE));
        site.route("POST", "/faggregation_queue2/*", Reply::ok(""));
        site.route("GET", "/accounts/polling", Reply::ok(r#"{"loading":false}"#));
        site.route("GET", "/groups", Reply::ok(GROUPS_PAGE));
        site.route("GET", "/groups/edit/grp1", Reply::ok(GROUP_EDIT_PAGE));
        site.route("GET", "/cf", Reply::ok(CATEGORY_PAGE));
        site.route("POST", "/cf/fetch", Reply::ok(ledger_script(LEDGER_ROWS)));
        site.route("POST", "/cf/create", Reply::ok(""));
        site.route("POST", "/cf/update", Reply::ok(""));
        site.route("PUT", "/cf/update", Reply::ok(""));
        site.route("PUT", "/cf/update.js", Reply::ok(""));
        site.route("DELETE", "/cf/*", Reply::ok(""));
        site.route("GET", "/accounts/show/acc1", Reply::ok(BANK_DETAIL_PAGE));
        site.route("GET", "/accounts/show/acc2", Reply::ok(CARD_DETAIL_PAGE));
        site.route("GET", "/accounts/show/acc3", Reply::ok(WALLET_DETAIL_PAGE));
        site
    }
}

/// Wraps ledger rows in the script the ledger endpoint answers with, escaping them into a
/// double-quoted script string.
pub(crate) fn ledger_script(rows: &str) -> String {
    let mut literal = String::with_capacity(rows.len() * 2);
    for c in rows.chars() {
        match c {
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '/' => literal.push_str("\\/"),
            '\n' => literal.push_str("\\n"),
            c => literal.push(c),
        }
    }
    format!("$(\".list_body\").empty();\n$(\".list_body\").append(\"{literal}\");\n")
}

const SIGN_IN_URL: &str = "https://id.moneyforward.com/sign_in?client_id=mf-client&redirect_uri=https%3A%2F%2Fmoneyforward.com%2Fauth%2Fmfid%2Fcallback&response_type=code";

const OTP_URL: &str = "https://id.moneyforward.com/email_otp?client_id=mf-client";

/// Seed sign-in page.
const SIGN_IN_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta name="csrf-token" content="signin-token" />
<title>Sign in</title>
</head>
<body>
<form action="/sign_in" method="post"><input type="email" name="mfid_user[email]"></form>
</body>
</html>
"##;

/// Seed one-time passcode challenge page.
const OTP_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta name="csrf-token" content="otp-token" />
<script>window.gon={};gon.authorizationParams={"client_id":"mf-client","redirect_uri":"https://moneyforward.com/auth/mfid/callback","response_type":"code","state":"st-1"};</script>
</head>
<body>
<form action="/email_otp" method="post"><input type="text" name="email_otp"></form>
</body>
</html>
"##;

/// Seed dashboard. `acc1` was refreshed 03/15 10:00, `acc2` has no refresh marker in the
/// expected place, and `acc3` claims a refresh on 12/31.
const DASHBOARD_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta name="csrf-token" content="app-token" />
</head>
<body>
<section id="registered-accounts">
<div class="account">
  <div class="heading"><a href="/accounts/show/acc1">Bank</a></div>
  <div class="controls">
    <div class="date acc1">取得日時(03/15 10:00)</div>
    <div class="buttons"><span><a data-remote="true" rel="nofollow" data-method="post" href="/faggregation_queue2/acc1">更新</a></span></div>
  </div>
</div>
<div class="account">
  <div class="heading"><a href="/accounts/show/acc2">Card</a></div>
  <div class="controls">
    <div class="date-not-display-none acc2">取得日時(03/14 08:30)</div>
    <div class="buttons"><span><a data-remote="true" rel="nofollow" data-method="post" href="/faggregation_queue2/acc2">更新</a></span></div>
  </div>
</div>
<div class="account">
  <div class="heading"><a href="/accounts/show/acc3">Wallet</a></div>
  <div class="controls">
    <div class="date acc3">取得日時(12/31 23:00)</div>
    <div class="buttons"><span><a data-remote="true" rel="nofollow" data-method="post" href="/faggregation_queue2/acc3">更新</a></span></div>
  </div>
</div>
</section>
</body>
</html>
"##;

/// Seed account group settings page.
const GROUPS_PAGE: &str = r##"<!DOCTYPE html>
<html>
<body>
<div class="group-list">
  <div class="name">グループ選択なし</div>
  <div class="edit"><a href="/groups/edit/grp1">編集</a></div>
</div>
</body>
</html>
"##;

/// Seed account group edit page. `Bank` has one enabled and one disabled sub-account, `Card` has
/// one enabled sub-account, `Wallet` has none and is enabled, and `Hidden` is disabled.
const GROUP_EDIT_PAGE: &str = r##"<!DOCTYPE html>
<html>
<body>
<form action="/groups/grp1" method="post">
<ul class="accounts">
<li><input type="checkbox" class="js-sub-account-group-parent" id="js-sub_account_split_acc1" value="sa-acc1" checked="checked">
Bank
<ul>
<li><input type="checkbox" class="acc1" value="sa-1a" checked="checked"> Savings
   Account </li>
<li><input type="checkbox" class="acc1" value="sa-1b">Old</li>
</ul>
</li>
<li><input type="checkbox" class="js-sub-account-group-parent" id="js-sub_account_split_acc2" value="sa-acc2" checked="checked">
Card
<ul>
<li><input type="checkbox" class="acc2" value="sa-2a" checked="checked">Gold</li>
</ul>
</li>
<li><input type="checkbox" class="js-sub-account-group-parent" id="js-sub_account_split_acc3" value="sa-acc3" checked="checked">
Wallet
</li>
<li><input type="checkbox" class="js-sub-account-group-parent" id="js-sub_account_split_acc4" value="sa-acc4">
Hidden
</li>
</ul>
</form>
</body>
</html>
"##;

/// Seed household ledger page with the category menus.
const CATEGORY_PAGE: &str = r##"<!DOCTYPE html>
<html>
<body>
<div class="btn-group">
<ul class="dropdown-menu main_menu plus">
  <li class="dropdown-submenu"><a class="l_c_name" id="1">収入</a>
    <ul class="dropdown-menu sub_menu">
      <li><a class="m_c_name" id="1">給与</a></li>
      <li><a class="m_c_name" id="2">賞与</a></li>
    </ul>
  </li>
</ul>
<ul class="dropdown-menu main_menu minus">
  <li class="dropdown-submenu"><a class="l_c_name" id="0">未分類</a>
    <ul class="dropdown-menu sub_menu">
      <li><a class="m_c_name" id="0">未分類</a></li>
    </ul>
  </li>
  <li class="dropdown-submenu"><a class="l_c_name" id="11">食費</a>
    <ul class="dropdown-menu sub_menu">
      <li><a class="m_c_name" id="41">食料品</a></li>
      <li><a class="m_c_name" id="42">外食</a></li>
    </ul>
  </li>
  <li class="dropdown-submenu"><a class="l_c_name" id="12">日用品</a>
    <ul class="dropdown-menu sub_menu">
      <li><a class="m_c_name" id="77">日用品</a></li>
    </ul>
  </li>
</ul>
</div>
</body>
</html>
"##;

/// Seed ledger rows for one month: two rows on 03/05, a transfer on 03/10, a voided row and a row
/// for an account without sub-accounts.
const LEDGER_ROWS: &str = r##"<tr class="transaction_list js-cf-edit-container" id="js-transaction-101">
<td class="icon"><i class="icon-check"></i></td>
<td class="date" data-table-sortable-value="2024/03/05-101"><span>03/05(火)</span></td>
<td class="content"><div><span>スーパー</span></div></td>
<td class="amount"><span class="offset">-1,280</span></td>
<td class="note calc" style="" title="Bank Savings Account">Bank<select class="sub-account"><option>Bank</option></select></td>
<td class="lctg"><a>食費</a></td>
<td class="mctg"><a>食料品</a></td>
<td class="memo"><span>weekly
shopping</span></td>
</tr>
<tr class="transaction_list js-cf-edit-container" id="js-transaction-102">
<td class="icon"><i class="icon-check"></i></td>
<td class="date" data-table-sortable-value="2024/03/05-102"><span>03/05(火)</span></td>
<td class="content"><div><span>給与</span></div></td>
<td class="amount"><span class="offset">250,000</span></td>
<td class="note calc" style="" title="Bank Savings Account">Bank</td>
<td class="lctg"><a>収入</a></td>
<td class="mctg"><a>給与</a></td>
<td class="memo"><span></span></td>
</tr>
<tr class="transaction_list js-cf-edit-container" id="js-transaction-103">
<td class="icon"><i class="icon-check"></i></td>
<td class="date" data-table-sortable-value="2024/03/10-103"><span>03/10(日)</span></td>
<td class="content"><div><span>カード引き落とし</span></div></td>
<td class="amount"><span class="offset">-50,000</span><div class="transfer_info">(振替)</div></td>
<td class="calc" style="" title="Bank Savings Accountから Card Goldへの振替">Bank<div class="transfer_account_box">Card</div></td>
<td class="lctg"><a>未分類</a></td>
<td class="mctg"><a>未分類</a></td>
<td class="memo"><span></span></td>
</tr>
<tr class="transaction_list js-cf-edit-container mf-grayout" id="js-transaction-104">
<td class="icon"><i class="icon-ban-circle"></i></td>
<td class="date" data-table-sortable-value="2024/03/12-104"><span>03/12(火)</span></td>
<td class="content"><div><span>取消</span></div></td>
<td class="amount"><span class="offset">-999</span></td>
<td class="note calc" style="" title="Wallet">Wallet</td>
<td class="lctg"><a>食費</a></td>
<td class="mctg"><a>外食</a></td>
<td class="memo"><span></span></td>
</tr>
<tr class="transaction_list js-cf-edit-container" id="js-transaction-105">
<td class="icon"><i class="icon-check"></i></td>
<td class="date" data-table-sortable-value="2024/03/01-105"><span>03/01(金)</span></td>
<td class="content"><div><span>ランチ</span></div></td>
<td class="amount"><span class="offset">-850</span></td>
<td class="note calc" style="" title="Wallet">Wallet</td>
<td class="lctg"><a>食費</a></td>
<td class="mctg"><a>外食</a></td>
<td class="memo"><span></span></td>
</tr>
"##;

/// Seed detail page of a bank account: a balance table with an excluded row and an empty row.
const BANK_DETAIL_PAGE: &str = r##"<!DOCTYPE html>
<html>
<body>
<h1 class="show-title">Bank(本店)</h1>
<table class="table table-bordered">
<thead><tr><th>種類・名称</th><th>名称</th><th>口座番号</th><th>残高</th></tr></thead>
<tbody>
<tr><td>普通</td><td>Savings</td><td>1234567</td><td>1,200,000円</td></tr>
<tr><td>定期</td><td>Time</td><td>7654321</td><td>300,000円</td></tr>
<tr class="outside-group"><td>普通</td><td>Other</td><td>1111111</td><td>5,000円</td></tr>
<tr><td>外貨</td><td>USD</td><td>2222222</td><td>-</td></tr>
</tbody>
</table>
</body>
</html>
"##;

/// Seed detail page of a credit card: a withdrawal table with a scheduled and an empty row.
const CARD_DETAIL_PAGE: &str = r##"<!DOCTYPE html>
<html>
<body>
<h1 class="show-title">Card</h1>
<table class="table table-bordered">
<thead><tr><th>カード名称</th><th>種類</th><th>番号</th><th>引き落とし予定額</th></tr></thead>
<tbody>
<tr><td>Card</td><td>Gold</td><td>****1234</td><td>45,600円(2024/04/27)</td></tr>
<tr><td>Card</td><td>ETC</td><td></td><td>-</td></tr>
</tbody>
</table>
</body>
</html>
"##;

/// Seed detail page of a cash wallet.
const WALLET_DETAIL_PAGE: &str = r##"<!DOCTYPE html>
<html>
<body>
<h1 class="show-title">Wallet</h1>
<table class="table table-bordered">
<thead><tr><th>種類・名称</th><th>名称</th><th>-</th><th>残高</th></tr></thead>
<tbody>
<tr><td>現金</td><td>財布</td><td></td><td>12,345円</td></tr>
</tbody>
</table>
</body>
</html>
"##;
