//! End-to-end tests for the XML-RPC transport

use rustsvc_core::database::keys;
use rustsvc_core::password::hash_password;
use rustsvc_core::{
    async_trait, Account, AccountStore, AuditEventType, AuthCookieManager, Channel,
    Config, ConnectionHandle, Database, EntityRef, FailedLoginHook, FaultCode, LoginFailureRecorder,
    MemoryAuditSink, Module, OnlineUser, OperClass, PathTable, RegisteredNick,
};
use rustsvc_modules::xmlrpc::{
    GatewaySettings, RpcCall, RpcResponse, RpcValue, XmlRpcContext, XmlRpcHandler, XmlRpcModule,
};
use rustsvc_services::{Command, HelpCommand, ServiceBot, ServiceManager, SourceInfo, StaffCommand};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts bad-password notifications and records them like the real hook
struct CountingHook {
    calls: AtomicUsize,
    recorder: LoginFailureRecorder,
}

impl FailedLoginHook for CountingHook {
    fn bad_password(&self, account: &Account, source: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorder.bad_password(account, source);
    }
}

/// Never produces output
struct Silent;

#[async_trait]
impl Command for Silent {
    fn name(&self) -> &str {
        "SILENT"
    }

    fn description(&self) -> &str {
        "Does nothing visible."
    }

    async fn execute(&self, _si: &mut SourceInfo<'_>, _params: &[String]) {}
}

/// Reports success twice
struct TwoLines;

#[async_trait]
impl Command for TwoLines {
    fn name(&self) -> &str {
        "TWOLINES"
    }

    fn description(&self) -> &str {
        "Replies with two lines."
    }

    async fn execute(&self, si: &mut SourceInfo<'_>, _params: &[String]) {
        si.success_nodata("first");
        si.success_nodata("second");
    }
}

/// Reports how many arguments it received
struct CountArgs;

#[async_trait]
impl Command for CountArgs {
    fn name(&self) -> &str {
        "COUNT"
    }

    fn description(&self) -> &str {
        "Counts its arguments."
    }

    async fn execute(&self, si: &mut SourceInfo<'_>, params: &[String]) {
        si.success_nodata(&params.len().to_string());
    }
}

/// Reports who the caller is
struct Whoami;

#[async_trait]
impl Command for Whoami {
    fn name(&self) -> &str {
        "WHOAMI"
    }

    fn description(&self) -> &str {
        "Shows the calling account."
    }

    async fn execute(&self, si: &mut SourceInfo<'_>, _params: &[String]) {
        let name = si.account.as_ref().map(|a| a.name.clone());
        match name {
            Some(name) => si.success_string(&name, &format!("You are {}", name)),
            None => si.success_string("anonymous", "You are not logged in"),
        }
    }
}

struct Harness {
    db: Arc<Database>,
    audit: Arc<MemoryAuditSink>,
    hook: Arc<CountingHook>,
    paths: Arc<PathTable<XmlRpcHandler>>,
    module: XmlRpcModule,
    conn: ConnectionHandle,
}

impl Harness {
    async fn new() -> Self {
        Self::with_settings(GatewaySettings::default()).await
    }

    async fn with_settings(settings: GatewaySettings) -> Self {
        let db = Arc::new(Database::new());
        let cookies = Arc::new(AuthCookieManager::new(3600));
        let audit = Arc::new(MemoryAuditSink::new());
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            recorder: LoginFailureRecorder::new(db.clone()),
        });

        let services = Arc::new(ServiceManager::new(db.clone()));
        let nickserv = Arc::new(ServiceBot::new("nickserv", "NickServ"));
        nickserv.bind_command(Arc::new(HelpCommand));
        nickserv.bind_command(Arc::new(StaffCommand::new(db.clone(), audit.clone())));
        services.add_service(nickserv).unwrap();

        let testserv = Arc::new(ServiceBot::new("testserv", "TestServ"));
        testserv.bind_command(Arc::new(Silent));
        testserv.bind_command(Arc::new(TwoLines));
        testserv.bind_command(Arc::new(CountArgs));
        testserv.bind_command(Arc::new(Whoami));
        services.add_service(testserv).unwrap();

        services
            .add_service(Arc::new(ServiceBot::new("emptyserv", "EmptyServ")))
            .unwrap();

        let context = XmlRpcContext {
            accounts: db.clone(),
            cookies,
            services,
            audit: audit.clone(),
            failed_login: hook.clone(),
            settings,
        };

        let paths = Arc::new(PathTable::new());
        let mut module = XmlRpcModule::new(context, paths.clone(), &Config::default());
        module.init().await.unwrap();

        Self {
            db,
            audit,
            hook,
            paths,
            module,
            conn: ConnectionHandle::new("198.51.100.7"),
        }
    }

    fn add_account(&self, name: &str, password: &str) -> Account {
        let account = Account::new(name, hash_password(password).unwrap(), format!("{}@example.com", name));
        self.db.add_account(account.clone()).unwrap();
        account
    }

    async fn call(&self, method: &str, params: &[&str]) -> RpcResponse {
        let call = RpcCall::new(method, params.iter().copied());
        self.module.call(&self.conn, &call).await.response
    }

    async fn login(&self, name: &str, password: &str) -> String {
        let response = self.call("atheme.login", &[name, password]).await;
        response.as_str().expect("login should succeed").to_string()
    }
}

fn fault_code(response: &RpcResponse) -> Option<FaultCode> {
    response.fault_code()
}

#[tokio::test]
async fn test_line_breaks_rejected_before_store_access() {
    let h = Harness::new().await;
    let calls: [(&str, Vec<&str>); 8] = [
        ("atheme.login", vec!["alice\r\n", "secret"]),
        ("atheme.logout", vec!["cookie", "alice\n"]),
        ("atheme.command", vec!["*", "*", "src", "TestServ", "COUNT\r"]),
        ("atheme.privset", vec!["cookie\n", "alice"]),
        ("atheme.ison", vec!["alice\r"]),
        ("atheme.metadata", vec!["#chan", "key\n"]),
        ("atheme.register", vec!["bob\n", "pw", "bob@example.com"]),
        ("atheme.verify", vec!["bob", "abc\r\n123"]),
    ];

    for (method, params) in calls {
        let response = h.call(method, &params).await;
        assert_eq!(fault_code(&response), Some(FaultCode::BadParams), "{}", method);
    }
    assert_eq!(h.db.account_count(), 0);
}

#[tokio::test]
async fn test_insufficient_parameters() {
    let h = Harness::new().await;
    assert_eq!(fault_code(&h.call("atheme.login", &["alice"]).await), Some(FaultCode::NeedMoreParams));
    assert_eq!(fault_code(&h.call("atheme.ison", &[]).await), Some(FaultCode::NeedMoreParams));
    assert_eq!(
        fault_code(&h.call("atheme.register", &["bob", "pw"]).await),
        Some(FaultCode::NeedMoreParams)
    );
    assert_eq!(
        fault_code(&h.call("atheme.command", &["*", "*", "src", "TestServ"]).await),
        Some(FaultCode::NeedMoreParams)
    );
}

#[tokio::test]
async fn test_unknown_method() {
    let h = Harness::new().await;
    let response = h.call("atheme.nonexistent", &[]).await;
    assert_eq!(fault_code(&response), Some(FaultCode::Unimplemented));
}

#[tokio::test]
async fn test_login_then_logout() {
    let h = Harness::new().await;
    let alice = h.add_account("alice", "secret");

    let ticket = h.login("alice", "secret").await;
    assert!(!ticket.is_empty());
    assert_eq!(h.audit.count(AuditEventType::Login), 1);
    assert!(h.db.find_account("alice").unwrap().last_login >= alice.last_login);

    let response = h.call("atheme.logout", &[&ticket, "alice"]).await;
    assert_eq!(response, RpcResponse::string("You are now logged out."));

    // the cookie is gone
    let response = h.call("atheme.logout", &[&ticket, "alice"]).await;
    assert_eq!(fault_code(&response), Some(FaultCode::BadAuthCookie));
}

#[tokio::test]
async fn test_logout_with_foreign_cookie() {
    let h = Harness::new().await;
    h.add_account("alice", "secret");
    h.add_account("carol", "hunter2");

    let carol_ticket = h.login("carol", "hunter2").await;
    let response = h.call("atheme.logout", &[&carol_ticket, "alice"]).await;
    assert_eq!(fault_code(&response), Some(FaultCode::BadAuthCookie));

    let response = h.call("atheme.logout", &[&carol_ticket, "nobody"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::NoSuchSource, "Unknown user."));
}

#[tokio::test]
async fn test_login_bad_password_fires_hook_once() {
    let h = Harness::new().await;
    h.add_account("alice", "secret");

    let response = h.call("atheme.login", &["alice", "wrongpass", "203.0.113.9"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(FaultCode::AuthFail, "The password is not valid for this account.")
    );
    assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.audit.count(AuditEventType::LoginFailure), 1);

    let failure = h
        .audit
        .events()
        .into_iter()
        .find(|e| e.event_type == AuditEventType::LoginFailure)
        .unwrap();
    assert_eq!(failure.target.as_deref(), Some("alice"));
    assert_eq!(failure.account, None);
    assert_eq!(failure.source.as_deref(), Some("203.0.113.9"));

    let alice = h.db.find_account("alice").unwrap();
    assert_eq!(alice.metadata(keys::LOGINFAIL_COUNT), Some("1"));
    assert_eq!(alice.metadata(keys::LOGINFAIL_ADDR), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_login_unknown_and_frozen() {
    let h = Harness::new().await;
    h.add_account("alice", "secret");

    let response = h.call("atheme.login", &["nobody", "secret"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(FaultCode::NoSuchSource, "The account is not registered.")
    );

    h.db
        .metadata_set(&EntityRef::Account("alice".into()), keys::FREEZER, "admin")
        .unwrap();
    let response = h.call("atheme.login", &["alice", "secret"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::NoPrivs, "The account has been frozen."));
    // frozen accounts are rejected before the password is checked
    assert_eq!(h.hook.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_register_twice() {
    let h = Harness::new().await;

    let response = h.call("atheme.register", &["bob", "pw", "e@example.com"]).await;
    assert_eq!(response, RpcResponse::string("Registration successful"));
    assert_eq!(h.db.account_count(), 1);
    assert_eq!(h.db.nick_count(), 1);
    assert_eq!(h.db.find_nick("bob").unwrap().owner, "bob");
    assert_eq!(h.audit.count(AuditEventType::Register), 1);

    let response = h.call("atheme.register", &["bob", "other", "x@example.com"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(FaultCode::AlreadyExists, "The account is already registered.")
    );
    assert_eq!(h.db.account_count(), 1);
    assert_eq!(h.db.nick_count(), 1);

    // the stored password works
    h.login("bob", "pw").await;
}

#[tokio::test]
async fn test_register_without_nick_ownership() {
    let settings = GatewaySettings {
        no_nick_ownership: true,
        ..GatewaySettings::default()
    };
    let h = Harness::with_settings(settings).await;
    h.db.add_online_user(OnlineUser {
        nick: "dave".into(),
        account: None,
    });

    let response = h.call("atheme.register", &["dave", "pw", "d@example.com"]).await;
    assert_eq!(response, RpcResponse::string("Registration successful"));
    assert_eq!(h.db.account_count(), 1);
    assert_eq!(h.db.nick_count(), 0);
}

#[tokio::test]
async fn test_register_rejections() {
    let h = Harness::new().await;

    let response = h.call("atheme.register", &["#bad", "pw", "e@example.com"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::BadParams, "Invalid username"));

    h.db.add_online_user(OnlineUser {
        nick: "erin".into(),
        account: None,
    });
    let response = h.call("atheme.register", &["erin", "pw", "e@example.com"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(FaultCode::NoPrivs, "A user matching this account is already on IRC.")
    );
    assert_eq!(h.db.account_count(), 0);
}

#[tokio::test]
async fn test_register_and_verify() {
    let h = Harness::new().await;

    let response = h
        .call("atheme.register", &["bob", "pw", "e@example.com", "192.0.2.4", "abc123"])
        .await;
    assert_eq!(response, RpcResponse::string("Registration successful"));
    let bob = h.db.find_account("bob").unwrap();
    assert!(bob.waiting_verification);
    assert_eq!(bob.metadata(keys::VERIFY_KEY), Some("abc123"));
    assert!(bob.metadata(keys::VERIFY_TIMESTAMP).is_some());

    let response = h.call("atheme.verify", &["bob", "wrong"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::BadParams, "Invalid verification key"));
    assert!(h.db.find_account("bob").unwrap().waiting_verification);

    let response = h.call("atheme.verify", &["bob", "ABC123"]).await;
    assert_eq!(response, RpcResponse::string("Verification successful"));
    let bob = h.db.find_account("bob").unwrap();
    assert!(!bob.waiting_verification);
    assert_eq!(bob.metadata(keys::VERIFY_KEY), None);
    assert_eq!(bob.metadata(keys::VERIFY_TIMESTAMP), None);
    assert_eq!(h.audit.count(AuditEventType::Verify), 1);

    let response = h.call("atheme.verify", &["bob", "abc123"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::BadParams, "Not awaiting verification"));

    let response = h.call("atheme.verify", &["nobody", "abc123"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(FaultCode::NoSuchTarget, "The account is not registered.")
    );
}

#[tokio::test]
async fn test_command_output_buffering() {
    let h = Harness::new().await;

    let response = h.call("atheme.command", &["*", "*", "src", "testserv", "SILENT"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(FaultCode::Unimplemented, "Command did not return a result.")
    );

    let response = h.call("atheme.command", &["*", "*", "src", "testserv", "twolines"]).await;
    assert_eq!(response, RpcResponse::string("first\nsecond"));
}

#[tokio::test]
async fn test_command_lookup_failures() {
    let h = Harness::new().await;

    let response = h.call("atheme.command", &["*", "*", "src", "NoServ", "HELP"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::NoSuchSource, "Invalid service name."));

    let response = h.call("atheme.command", &["*", "*", "src", "EmptyServ", "HELP"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::NoSuchSource, "Invalid service name."));

    let response = h.call("atheme.command", &["*", "*", "src", "TestServ", "NOPE"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::NoSuchSource, "Invalid command name."));

    let response = h.call("atheme.command", &["*", "*", "", "TestServ", "COUNT"]).await;
    assert_eq!(response, RpcResponse::fault(FaultCode::BadParams, "Invalid parameters."));

    // every dispatch that got past sanitization is audited, faults included
    assert_eq!(h.audit.count(AuditEventType::Command), 3);
    assert!(h
        .audit
        .events()
        .iter()
        .filter(|e| e.event_type == AuditEventType::Command)
        .all(|e| e.error.is_some()));
}

#[tokio::test]
async fn test_command_caller_resolution() {
    let h = Harness::new().await;
    h.add_account("alice", "secret");
    let ticket = h.login("alice", "secret").await;

    let response = h.call("atheme.command", &["*", "*", "src", "TestServ", "WHOAMI"]).await;
    assert_eq!(response, RpcResponse::string("anonymous"));

    let response = h
        .call("atheme.command", &[&ticket, "alice", "src", "TestServ", "WHOAMI"])
        .await;
    assert_eq!(response, RpcResponse::string("alice"));

    let response = h
        .call("atheme.command", &["forged", "alice", "src", "TestServ", "WHOAMI"])
        .await;
    assert_eq!(fault_code(&response), Some(FaultCode::BadAuthCookie));

    let response = h
        .call("atheme.command", &[&ticket, "nobody", "src", "TestServ", "WHOAMI"])
        .await;
    assert_eq!(response, RpcResponse::fault(FaultCode::NoSuchSource, "Unknown user."));
}

#[tokio::test]
async fn test_command_args_truncated() {
    let h = Harness::new().await;
    let mut params = vec!["*", "*", "src", "TestServ", "COUNT"];
    params.extend(std::iter::repeat("x").take(25));

    let response = h.call("atheme.command", &params).await;
    assert_eq!(response, RpcResponse::string("20"));
}

#[tokio::test]
async fn test_command_by_service_nick_with_formatting_stripped() {
    let h = Harness::new().await;

    let response = h.call("atheme.command", &["*", "*", "src", "NickServ", "HELP"]).await;
    let text = response.as_str().unwrap().to_string();
    assert!(text.starts_with("***** NickServ Help *****\n"));
    assert!(text.ends_with("***** End of Help *****"));
    assert!(!text.contains('\x02'));
}

#[tokio::test]
async fn test_staff_over_xmlrpc() {
    let h = Harness::new().await;
    h.add_account("admin", "adminpw");
    h.add_account("bob", "bobpw");
    h.db.add_operclass(OperClass {
        name: "sra".into(),
        privs: "general:grant user:auspex".into(),
    });
    h.db.set_oper_class("admin", Some("sra".into())).unwrap();

    let admin_ticket = h.login("admin", "adminpw").await;
    let response = h
        .call("atheme.command", &[&admin_ticket, "admin", "10.0.0.1", "NickServ", "STAFF", "bob", "ON"])
        .await;
    assert_eq!(response, RpcResponse::string("bob is now a member of staff."));
    assert_eq!(
        h.db.find_account("bob").unwrap().metadata(keys::STAFF_SETTER),
        Some("admin (10.0.0.1)")
    );

    let bob_ticket = h.login("bob", "bobpw").await;
    let response = h
        .call("atheme.command", &[&bob_ticket, "bob", "src", "NickServ", "STAFF", "admin", "ON"])
        .await;
    assert_eq!(fault_code(&response), Some(FaultCode::NoPrivs));
}

#[tokio::test]
async fn test_privset() {
    let h = Harness::new().await;
    h.add_account("admin", "adminpw");
    h.add_account("bob", "bobpw");
    h.db.add_operclass(OperClass {
        name: "sra".into(),
        privs: "general:grant user:auspex".into(),
    });
    h.db.set_oper_class("admin", Some("sra".into())).unwrap();

    let ticket = h.login("admin", "adminpw").await;
    let response = h.call("atheme.privset", &[&ticket, "admin"]).await;
    assert_eq!(response, RpcResponse::string("general:grant user:auspex"));

    let ticket = h.login("bob", "bobpw").await;
    let response = h.call("atheme.privset", &[&ticket, "bob"]).await;
    assert_eq!(response, RpcResponse::string(""));

    let response = h.call("atheme.privset", &["", ""]).await;
    assert_eq!(response, RpcResponse::string(""));

    let response = h.call("atheme.privset", &["forged", "admin"]).await;
    assert_eq!(fault_code(&response), Some(FaultCode::BadAuthCookie));
}

#[tokio::test]
async fn test_ison() {
    let h = Harness::new().await;
    h.db.add_online_user(OnlineUser {
        nick: "alice".into(),
        account: Some("alice".into()),
    });
    h.db.add_online_user(OnlineUser {
        nick: "guest".into(),
        account: None,
    });

    let online = |account: &str| {
        RpcResponse::Params(vec![RpcValue::Boolean(true), RpcValue::String(account.into())])
    };
    assert_eq!(h.call("atheme.ison", &["Alice"]).await, online("alice"));
    assert_eq!(h.call("atheme.ison", &["guest"]).await, online("*"));
    assert_eq!(
        h.call("atheme.ison", &["nobody"]).await,
        RpcResponse::Params(vec![RpcValue::Boolean(false), RpcValue::String("*".into())])
    );
}

#[tokio::test]
async fn test_metadata() {
    let h = Harness::new().await;
    let alice = h.add_account("alice", "secret");
    h.db
        .metadata_set(&EntityRef::Account("alice".into()), "url", "https://example.com")
        .unwrap();
    let mut channel = Channel::new("#rust");
    channel.metadata.insert("topic".into(), "ownership".into());
    h.db.add_channel(channel).unwrap();

    let response = h.call("atheme.metadata", &["#missing", "topic"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(
            FaultCode::NoSuchSource,
            "No channel registration was found for the provided channel name."
        )
    );

    let response = h.call("atheme.metadata", &["#rust", "nokey"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(
            FaultCode::NoSuchSource,
            "No metadata found matching this account/channel and key."
        )
    );

    let response = h.call("atheme.metadata", &["#rust", "topic", "ignored"]).await;
    assert_eq!(response, RpcResponse::string("ownership"));

    let response = h.call("atheme.metadata", &["alice", "url"]).await;
    assert_eq!(response, RpcResponse::string("https://example.com"));

    let response = h.call("atheme.metadata", &[&alice.uid, "url"]).await;
    assert_eq!(response, RpcResponse::string("https://example.com"));

    // registered nicknames resolve to their owning account
    h.db.add_nick(RegisteredNick::new("ally", "alice")).unwrap();
    let response = h.call("atheme.metadata", &["ally", "url"]).await;
    assert_eq!(response, RpcResponse::string("https://example.com"));

    let response = h.call("atheme.metadata", &["nobody", "url"]).await;
    assert_eq!(
        response,
        RpcResponse::fault(FaultCode::NoSuchSource, "No account was found for this accountname or UID.")
    );
}

#[tokio::test]
async fn test_path_registration_is_idempotent() {
    let mut h = Harness::new().await;
    assert_eq!(h.paths.len(), 1);
    assert!(h.paths.route("/xmlrpc").is_some());

    let mut config = Config::default();
    h.module.config_ready(&config).await.unwrap();
    h.module.config_ready(&config).await.unwrap();
    assert_eq!(h.paths.len(), 1);

    config.xmlrpc.path = "/rpc".into();
    h.module.config_ready(&config).await.unwrap();
    assert_eq!(h.paths.len(), 1);
    assert!(h.paths.route("/xmlrpc").is_none());
    assert!(h.paths.route("/rpc").is_some());

    h.module.cleanup().await.unwrap();
    assert!(h.paths.is_empty());
    assert!(h.module.methods().is_empty());
}

#[tokio::test]
async fn test_routed_handler_serves_calls() {
    let h = Harness::new().await;
    let handler = h.paths.route("/xmlrpc").unwrap();

    let conn = ConnectionHandle::new("192.0.2.1").with_connection_close(true);
    let reply = handler.handle(&conn, &RpcCall::new("atheme.ison", ["nobody"])).await;
    assert!(reply.connection_close);
    assert!(!reply.response.is_fault());
    assert_eq!(h.module.methods().len(), 8);
}
