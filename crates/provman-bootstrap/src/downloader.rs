// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The builtin "WebDownloader" downloader provider.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;

use provman_adapter::{DynamicObject, DynamicType};
use provman_core::{
    CandidateType, DownloadTransport, HostHandle, MemberSignature, ProvmanError, Result, Value,
    ValueKind,
};

pub const WEB_DOWNLOADER_NAME: &str = "WebDownloader";

/// Candidate type for the HTTPS downloader backed by `transport`.
pub fn web_downloader_type(
    transport: Arc<dyn DownloadTransport>,
    timeout: Duration,
) -> Result<Arc<dyn CandidateType>> {
    let ty = DynamicType::new("WebDownloader", move || Ok(web_downloader(transport.clone(), timeout)))?;
    Ok(ty.into_arc())
}

fn web_downloader(transport: Arc<dyn DownloadTransport>, timeout: Duration) -> DynamicObject {
    use ValueKind::{String as S, StringList, Unit};

    DynamicObject::builder("WebDownloader")
        .method("initialize_provider", MemberSignature::new([], Unit), |_, _| async {
            Ok(Value::unit())
        })
        .method("get_downloader_name", MemberSignature::new([], S), |_, _| async {
            Ok(Value::from(WEB_DOWNLOADER_NAME))
        })
        .method("supported_schemes", MemberSignature::new([], StringList), |_, _| async {
            Ok(Value::from(vec!["https".to_string()]))
        })
        .method("download_file", MemberSignature::new([S, S], S), move |args, host| {
            let transport = transport.clone();
            async move { download_file(transport.as_ref(), args, timeout, host).await }
        })
        .build()
}

async fn download_file(
    transport: &dyn DownloadTransport,
    args: Vec<Json>,
    timeout: Duration,
    host: HostHandle,
) -> Result<Value> {
    let (Some(uri), Some(local)) = (
        args.first().and_then(Json::as_str),
        args.get(1).and_then(Json::as_str),
    ) else {
        return Err(ProvmanError::InvalidArgument(
            "download_file needs a uri and a local path".to_string(),
        ));
    };

    let downloaded = transport
        .download(uri, &PathBuf::from(local), timeout, true, &host)
        .await?;
    Ok(match downloaded {
        Some(path) => Value::from(path.display().to_string()),
        None => Value::unit(),
    })
}
