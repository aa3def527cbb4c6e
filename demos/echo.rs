use ingestd::{Handled, Handler, Request, Response, Server, StatusCode};
use std::str::from_utf8;
use tokio::net::TcpListener;

struct MyHandler;

impl Handler for MyHandler {
    async fn handle(&self, _: &mut (), req: &mut Request, resp: &mut Response) -> Handled {
        let cookies: Vec<String> = req
            .cookies()
            .iter()
            .map(|(name, value)| {
                format!(
                    "{:?}:{:?}",
                    from_utf8(name).unwrap_or(""),
                    from_utf8(value).unwrap_or("")
                )
            })
            .collect();

        let form: Vec<String> = req
            .form()
            .iter()
            .map(|(name, value)| {
                format!(
                    "{:?}:{:?}",
                    from_utf8(name).unwrap_or(""),
                    from_utf8(value).unwrap_or("")
                )
            })
            .collect();

        let result = format!(
            r#"{{"url": {:?}, "query": {:?}, "cookies": [{}], "form": [{}], "body": {:?}}}"#,
            from_utf8(req.url().path()).unwrap_or(""),
            req.url().query_full().and_then(|q| from_utf8(q).ok()).unwrap_or(""),
            cookies.join(","),
            form.join(","),
            from_utf8(req.body().unwrap_or(&[])).unwrap_or(""),
        );

        resp.status(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body(result)
    }
}

#[tokio::main]
async fn main() {
    Server::builder()
        .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
        .handler(MyHandler)
        .build()
        .launch()
        .await;
}
