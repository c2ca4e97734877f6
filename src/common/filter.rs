use ambassador::{delegatable_trait, Delegate};

#[delegatable_trait]
pub trait FilterInterface {
    fn evaluate(&self, p: &na::Point2<f32>) -> f32;
    fn radius(&self) -> &na::Vector2<f32>;
}

#[derive(Delegate, Clone, Debug)]
#[delegate(FilterInterface)]
pub enum Filter {
    Box(BoxFilter),
    Triangle(TriangleFilter),
    Gaussian(GaussianFilter),
}

#[derive(Clone, Debug)]
pub struct BoxFilter {
    radius: na::Vector2<f32>,
}

impl BoxFilter {
    pub fn new(radius: &na::Vector2<f32>) -> Self {
        Self { radius: *radius }
    }
}

impl FilterInterface for BoxFilter {
    fn evaluate(&self, _p: &na::Point2<f32>) -> f32 {
        1.0
    }

    fn radius(&self) -> &na::Vector2<f32> {
        &self.radius
    }
}

#[derive(Clone, Debug)]
pub struct TriangleFilter {
    radius: na::Vector2<f32>,
}

impl TriangleFilter {
    pub fn new(radius: &na::Vector2<f32>) -> Self {
        Self { radius: *radius }
    }
}

impl FilterInterface for TriangleFilter {
    fn evaluate(&self, p: &na::Point2<f32>) -> f32 {
        0.0f32.max(self.radius.x - p.x.abs()) * 0.0f32.max(self.radius.y - p.y.abs())
    }

    fn radius(&self) -> &na::Vector2<f32> {
        &self.radius
    }
}

#[derive(Clone, Debug)]
pub struct GaussianFilter {
    radius: na::Vector2<f32>,
    alpha: f32,
    exp_x: f32,
    exp_y: f32,
}

impl GaussianFilter {
    pub fn new(radius: &na::Vector2<f32>, alpha: f32) -> Self {
        Self {
            radius: *radius,
            alpha,
            exp_x: (-alpha * radius.x * radius.x).exp(),
            exp_y: (-alpha * radius.y * radius.y).exp(),
        }
    }

    fn gaussian(&self, d: f32, expv: f32) -> f32 {
        0.0f32.max((-self.alpha * d * d).exp() - expv)
    }
}

impl FilterInterface for GaussianFilter {
    fn evaluate(&self, p: &na::Point2<f32>) -> f32 {
        self.gaussian(p.x, self.exp_x) * self.gaussian(p.y, self.exp_y)
    }

    fn radius(&self) -> &na::Vector2<f32> {
        &self.radius
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Box,
    Triangle,
    Gaussian,
}

impl Filter {
    pub fn from_kind(kind: FilterKind, radius: f32) -> Self {
        let radius = na::Vector2::new(radius, radius);
        match kind {
            FilterKind::Box => Filter::Box(BoxFilter::new(&radius)),
            FilterKind::Triangle => Filter::Triangle(TriangleFilter::new(&radius)),
            FilterKind::Gaussian => Filter::Gaussian(GaussianFilter::new(&radius, 2.0)),
        }
    }
}
