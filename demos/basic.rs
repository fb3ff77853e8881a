//! Minimal strand example: the classic stack plus two handlers.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/hello
//!   curl -i http://localhost:3000/private            → 401
//!   curl -i -H 'authorization: token' http://localhost:3000/private
//!   curl -i http://localhost:3000/boom               → 500 from Recovery
//!
//! Files under ./public are served before any of this runs.

use http::StatusCode;
use strand::{Context, Next, Pipeline, Request, ResponseWriter};

struct Authorized;

#[tokio::main]
async fn main() {
    // The only place a log sink is chosen.
    tracing_subscriber::fmt::init();

    let mut app = Pipeline::classic();
    app.append_fn(auth);
    app.append_fn(routes);

    app.run("0.0.0.0:3000").await;
}

// Short-circuits /private without a token; otherwise tags the context.
fn auth(ctx: &Context, rw: &mut ResponseWriter, req: &Request, next: Next<'_>) {
    if req.header_str("authorization").is_some() {
        return next.run(&ctx.with_value(Authorized), rw, req);
    }
    if req.path().starts_with("/private") {
        rw.write_header(StatusCode::UNAUTHORIZED);
        return;
    }
    next.run(ctx, rw, req);
}

fn routes(ctx: &Context, rw: &mut ResponseWriter, req: &Request, _next: Next<'_>) {
    match req.path() {
        "/hello" => rw.write_body(b"hello\n"),
        "/private" if ctx.value::<Authorized>().is_some() => rw.write_body(b"welcome\n"),
        "/boom" => panic!("demo panic"),
        _ => rw.write_header(StatusCode::NOT_FOUND),
    }
}
