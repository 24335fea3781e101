use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{Error, ResponseError};
use futures_util::future::{Ready, ok};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::ApiError;

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub per_minute: u32,
    pub per_day: u32,
}

struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn admit(&mut self, now: Instant, window: Duration, limit: u32) -> bool {
        if now.duration_since(self.started) >= window {
            self.started = now;
            self.count = 0;
        }
        if self.count >= limit {
            return false;
        }
        self.count += 1;
        true
    }
}

struct ClientWindows {
    minute: Window,
    day: Window,
}

/// Fixed-window counters per client IP, kept in process memory. State is
/// lost on restart, which is acceptable for this service.
pub struct RateLimiter {
    limits: RateLimits,
    clients: Mutex<HashMap<String, ClientWindows>>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = clients
            .entry(key.to_string())
            .or_insert_with(|| ClientWindows {
                minute: Window {
                    started: now,
                    count: 0,
                },
                day: Window {
                    started: now,
                    count: 0,
                },
            });

        // The hit is counted in both windows even when one of them denies.
        let minute_ok = state.minute.admit(now, MINUTE, self.limits.per_minute);
        let day_ok = state.day.admit(now, DAY, self.limits.per_day);
        minute_ok && day_ok
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(limits)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitService {
            service: Arc::new(service),
            limiter: self.limiter.clone(),
        })
    }
}

pub struct RateLimitService<S> {
    service: Arc<S>,
    limiter: Arc<RateLimiter>,
}

fn client_key(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let key = client_key(&req);
        let allowed = self.limiter.check(&key);

        Box::pin(async move {
            if allowed {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            } else {
                log::warn!("Rate limit exceeded for {} on {}", key, req.path());
                let (http_req, _payload) = req.into_parts();
                let response = ApiError::RateLimited
                    .error_response()
                    .map_into_right_body();
                Ok(ServiceResponse::new(http_req, response))
            }
        })
    }
}
